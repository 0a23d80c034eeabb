use dyna_core::{
    Result,
    env::Env,
    policies::Policy,
    sampling::sample_action,
    samples::{TerminationSample, Transition, TrialRecord},
};
use rand::Rng;
use tracing::debug;

/// Plays one real episode with `policy` and turns every step into supervised samples.
///
/// A step whose reward equals `max_reward` gets no termination label. Steps cut by a time limit
/// are labeled non-terminal, only a real termination is a positive label. Labeling with
/// `snapshot.done()` instead would teach the termination model that the time limit is a failure.
pub fn run_trial<E: Env, P: Policy, R: Rng + ?Sized>(
    env: &mut E,
    policy: &P,
    max_reward: f32,
    rng: &mut R,
) -> Result<TrialRecord> {
    let start = env.reset(rng.random())?;
    let mut state = start.clone();
    let mut transitions = vec![];
    let mut terminations = vec![];
    let mut total_reward = 0.;
    loop {
        let log_probs = policy.log_probs(&state)?;
        let action = sample_action(&log_probs, rng)?;
        let snapshot = env.step(action)?;
        total_reward += snapshot.reward;

        if snapshot.reward != max_reward {
            terminations.push(TerminationSample {
                state: state.clone(),
                action,
                terminal: snapshot.terminated,
            });
        }
        let done = snapshot.done();
        transitions.push(Transition {
            state,
            action,
            next_state: snapshot.state.clone(),
        });
        state = snapshot.state;

        if done {
            debug!(steps = transitions.len(), total_reward, "real episode finished");
            return Ok(TrialRecord {
                start,
                transitions,
                terminations,
                total_reward,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use super::run_trial;
    use dyna_core::{
        env::{Env, EnvironmentDescription, Observation, SnapShot, Space},
        error::EnvError,
        policies::Policy,
    };
    use rand::{SeedableRng, rngs::StdRng};

    /// Counts up by the action plus one and pays `rewards[t]` on step `t`. The last step
    /// terminates, or is cut by a time limit when `truncates` is set.
    struct Scripted {
        t: usize,
        state: f32,
        rewards: Vec<f32>,
        truncates: bool,
    }

    impl Env for Scripted {
        fn reset(&mut self, _seed: u64) -> Result<Observation, EnvError> {
            self.t = 0;
            self.state = 0.;
            Ok(Observation::new(vec![self.state]))
        }

        fn step(&mut self, action: usize) -> Result<SnapShot, EnvError> {
            self.state += action as f32 + 1.;
            let reward = self.rewards[self.t];
            self.t += 1;
            let last = self.t == self.rewards.len();
            Ok(SnapShot {
                state: Observation::new(vec![self.state]),
                reward,
                terminated: last && !self.truncates,
                truncated: last && self.truncates,
            })
        }

        fn env_description(&self) -> EnvironmentDescription {
            EnvironmentDescription::new(Space::continous_from_dims(vec![1]), Space::Discrete(2))
        }
    }

    struct Uniform;

    impl Policy for Uniform {
        fn log_probs(&self, _observation: &Observation) -> dyna_core::Result<Vec<f32>> {
            Ok(vec![0.5f32.ln(); 2])
        }

        fn action_size(&self) -> usize {
            2
        }
    }

    #[test]
    fn transitions_chain_the_observed_states() -> dyna_core::Result<()> {
        let mut env = Scripted {
            t: 0,
            state: 0.,
            rewards: vec![1.; 6],
            truncates: false,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let trial = run_trial(&mut env, &Uniform, 500., &mut rng)?;
        assert_eq!(trial.start, Observation::new(vec![0.]));
        assert_eq!(trial.transitions.len(), 6);
        assert_eq!(trial.total_reward, 6.);
        let mut previous = trial.start.clone();
        for transition in &trial.transitions {
            assert_eq!(transition.state, previous);
            let delta = transition.next_state[0] - transition.state[0];
            assert_eq!(delta, transition.action as f32 + 1.);
            previous = transition.next_state.clone();
        }
        let terminals: Vec<bool> = trial.terminations.iter().map(|t| t.terminal).collect();
        assert_eq!(terminals, vec![false, false, false, false, false, true]);
        Ok(())
    }

    #[test]
    fn max_reward_steps_are_not_labeled() -> dyna_core::Result<()> {
        let mut env = Scripted {
            t: 0,
            state: 0.,
            rewards: vec![1., 500., 1., 500., 500.],
            truncates: false,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let trial = run_trial(&mut env, &Uniform, 500., &mut rng)?;
        assert_eq!(trial.transitions.len(), 5);
        assert_eq!(trial.terminations.len(), 2);
        assert_eq!(trial.terminations[0].state, trial.transitions[0].state);
        assert_eq!(trial.terminations[1].state, trial.transitions[2].state);
        assert!(trial.terminations.iter().all(|t| !t.terminal));
        Ok(())
    }

    #[test]
    fn time_limits_are_not_failures() -> dyna_core::Result<()> {
        let mut env = Scripted {
            t: 0,
            state: 0.,
            rewards: vec![1.; 4],
            truncates: true,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let trial = run_trial(&mut env, &Uniform, 500., &mut rng)?;
        assert_eq!(trial.transitions.len(), 4);
        assert_eq!(trial.terminations.len(), 4);
        assert!(trial.terminations.iter().all(|t| !t.terminal));
        Ok(())
    }
}
