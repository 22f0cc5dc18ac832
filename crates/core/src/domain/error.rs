// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
