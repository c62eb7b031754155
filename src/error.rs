//! Crate-level error type for construction and rendering.

use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::plan::PlanError;
use crate::store::StoreError;
use std::fmt;

/// Any failure outside the block path.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Graph(GraphError),
    Plan(PlanError),
    Store(StoreError),
    Wav(hound::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "invalid configuration: {}", e),
            Error::Graph(e) => write!(f, "patch construction failed: {}", e),
            Error::Plan(e) => write!(f, "plan compilation failed: {}", e),
            Error::Store(e) => write!(f, "rejected host write: {}", e),
            Error::Wav(e) => write!(f, "wav output failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Wav(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<GraphError> for Error {
    fn from(e: GraphError) -> Self {
        Error::Graph(e)
    }
}

impl From<PlanError> for Error {
    fn from(e: PlanError) -> Self {
        Error::Plan(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::Wav(e)
    }
}
