use dyna_core::{
    env::Env,
    retry::{RetryPolicy, RetryingEnv},
};
use dyna_gym::{CartPole, HttpGymClient, MonitorSettings};
use std::time::Duration;

#[test]
fn unreachable_servers_are_transient_failures() {
    let client = HttpGymClient::new("http://127.0.0.1:1/", Duration::from_millis(500)).unwrap();
    let err = client.create("CartPole-v1").unwrap_err();
    assert!(err.is_transient(), "{err}");
    assert!(err.is_resendable(), "{err}");
}

#[test]
fn monitor_defaults_overwrite_old_recordings() {
    let settings = MonitorSettings::new("/tmp/cartpole");
    assert!(settings.force);
    assert!(!settings.resume);
    assert!(!settings.video);
}

#[test]
fn retrying_a_local_env_is_transparent() {
    let mut plain = CartPole::default();
    let mut wrapped = RetryingEnv::new(CartPole::default(), RetryPolicy::default());
    assert_eq!(plain.reset(5).unwrap(), wrapped.reset(5).unwrap());
    for action in [0, 1, 1, 0] {
        let a = plain.step(action).unwrap();
        let b = wrapped.step(action).unwrap();
        assert_eq!(a.state, b.state);
        assert_eq!(a.done(), b.done());
    }
}
