use std::error::Error;
use std::fmt;
use thiserror::Error as ThisError;

use crate::runner::context::ContextError;
use crate::runner::interfaces::{CoderError, StateError};
use crate::sdf::restriction::IncompleteRestrictionError;
use crate::timers::handle::TimerError;
use crate::user_fn::descriptor::ConfigError;

/// Carrier for any failure raised by user transform code. The core never
/// recovers from these; the bundle as a whole fails.
#[derive(Debug, ThisError)]
#[error("user code failed: {source}")]
pub struct UserCodeError {
    #[source]
    source: Box<dyn Error + Send + Sync>,
}

impl UserCodeError {
    pub fn wrap(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        UserCodeError {
            source: source.into(),
        }
    }

    pub fn message(message: impl fmt::Display) -> Self {
        UserCodeError {
            source: message.to_string().into(),
        }
    }
}

/// Failures surfaced by the per-transform execution core.
#[derive(Debug, ThisError)]
pub enum RunnerError {
    #[error(transparent)]
    UserCode(#[from] UserCodeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Coder(#[from] CoderError),
    #[error(transparent)]
    RestrictionIncomplete(#[from] IncompleteRestrictionError),
    #[error("{hook} is not implemented by this transform")]
    UnsupportedHook { hook: &'static str },
    #[error("tear_down may only be invoked once")]
    AlreadyTornDown,
}

impl RunnerError {
    /// Wraps an arbitrary user failure.
    pub fn user(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        RunnerError::UserCode(UserCodeError::wrap(source))
    }

    pub fn unsupported_hook(hook: &'static str) -> Self {
        RunnerError::UnsupportedHook { hook }
    }
}
