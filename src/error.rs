use std::fmt;

use crate::config::ConfigurationError;
use crate::scheduler::errors::SchedulerError;

/// Crate-level error facade for embedders that wire the whole stack
/// together and want a single error type at their boundary.
#[derive(Debug)]
pub enum BrokerError {
    Scheduler(SchedulerError),
    Configuration(ConfigurationError),
    Database(String),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Scheduler(e) => write!(f, "Scheduler error: {e}"),
            BrokerError::Configuration(e) => write!(f, "Configuration error: {e}"),
            BrokerError::Database(msg) => write!(f, "Database error: {msg}"),
        }
    }
}

impl std::error::Error for BrokerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrokerError::Scheduler(e) => Some(e),
            BrokerError::Configuration(e) => Some(e),
            BrokerError::Database(_) => None,
        }
    }
}

impl From<SchedulerError> for BrokerError {
    fn from(e: SchedulerError) -> Self {
        BrokerError::Scheduler(e)
    }
}

impl From<ConfigurationError> for BrokerError {
    fn from(e: ConfigurationError) -> Self {
        BrokerError::Configuration(e)
    }
}

impl From<sqlx::Error> for BrokerError {
    fn from(e: sqlx::Error) -> Self {
        BrokerError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
