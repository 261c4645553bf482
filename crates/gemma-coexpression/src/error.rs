//! Error types for support data and the support ledger.

use crate::id_array::MAX_ID;

/// A support blob or id that cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupportDataError {
    #[error("Corrupt support data: {0}")]
    Corrupt(String),
    #[error("Id {0} is out of range (max {MAX_ID})")]
    IdOutOfRange(u64),
}

impl SupportDataError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Missing tested-in data for gene {0}")]
    MissingTestedIn(u64),
    #[error("Experiment {experiment} already supports link {first_gene}-{second_gene}; remove it first")]
    AlreadySupported {
        experiment: u64,
        first_gene: u64,
        second_gene: u64,
    },
    #[error("Link {first_gene}-{second_gene} appears more than once in the input")]
    DuplicateLink { first_gene: u64, second_gene: u64 },
    #[error(transparent)]
    SupportData(#[from] SupportDataError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
