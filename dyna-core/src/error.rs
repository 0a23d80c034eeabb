//! Error taxonomy shared by every crate in the workspace.
//!
//! Transport failures come out of an [`Env`](crate::env::Env) and are either transient (retried by
//! [`RetryingEnv`](crate::retry::RetryingEnv)) or fatal. A transient failure also records whether
//! the request could have reached the service, since only unsent requests may be replayed when
//! they advance the simulation. Numerical divergence of the learned models
//! is not an error: it is detected where predictions are consumed and the offending samples are
//! dropped. Cancellation is not an error either, it is a state of the training loop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    /// The environment service could not be reached or answered with a server side failure.
    #[error("environment transport failure: {message}")]
    Transport {
        message: String,
        transient: bool,
        /// The request never left this process, e.g. the connection was refused.
        unsent: bool,
    },

    /// The service answered, but not with something we can interpret.
    #[error("unexpected environment response: {0}")]
    Protocol(String),

    /// An action outside of the discrete action space was sent.
    #[error("action {action} is outside of the action space of size {size}")]
    InvalidAction { action: usize, size: usize },
}

impl EnvError {
    /// A failure that may go away, for a request the service may already have acted on.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            transient: true,
            unsent: false,
        }
    }

    /// The service could not be reached at all.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            transient: true,
            unsent: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            transient: false,
            unsent: false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                transient: true,
                ..
            }
        )
    }

    /// Transient, and replaying the request cannot apply it twice.
    pub fn is_resendable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                transient: true,
                unsent: true,
                ..
            }
        )
    }
}

#[derive(Error, Debug)]
pub enum DynaError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("tensor operation failed: {0}")]
    Candle(#[from] candle_core::Error),

    /// Imagined rollouts need at least one real episode start to branch from.
    #[error("the episode start pool is empty")]
    EmptyStartPool,

    #[error("invalid action distribution: {0}")]
    InvalidDistribution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report sink failed: {0}")]
    Report(String),
}

pub type Result<T> = std::result::Result<T, DynaError>;
