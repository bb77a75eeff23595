use crate::resource::Resource;
use std::fmt;
use thiserror::Error;

/// Shortfall reported when a deduction cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoEnoughResources {
    pub available: Vec<Resource>,
    pub required: Vec<Resource>,
    pub missing: Vec<Resource>,
}

impl NoEnoughResources {
    pub fn new(available: Vec<Resource>, required: Vec<Resource>, missing: Vec<Resource>) -> Self {
        Self {
            available,
            required,
            missing,
        }
    }
}

impl fmt::Display for NoEnoughResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing = self
            .missing
            .iter()
            .map(|r| format!("{} {}", r.type_id, r))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "missing {missing}")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Unsupported type id, mismatched type or malformed list. A programming
    /// or configuration error, never a quota decision.
    #[error("Invalid resource set: {0}")]
    InvalidResourceSet(String),

    #[error("Not enough resources: {0}")]
    NoEnoughResources(Box<NoEnoughResources>),

    /// User-facing quota violation with a precomposed message.
    #[error("{0}")]
    LimitExceeded(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource ledger error: {0}")]
    Ledger(String),
}

impl From<NoEnoughResources> for ResourceError {
    fn from(err: NoEnoughResources) -> Self {
        ResourceError::NoEnoughResources(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ResourceError>;
