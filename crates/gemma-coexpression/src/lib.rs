//! Gemma coexpression support
//!
//! Tracks which experiments support each gene-gene coexpression link, and
//! which experiments each gene was tested in, as compact bit-vectors that
//! persist in the JavaEWAH blob format.
//!
//! ## Key Features
//!
//! - **Exact counts**: `IdArray` keeps one bit per experiment id
//! - **Blob compatible**: 64-bit EWAH encoding, corrupt input is an error
//! - **Shared support**: a link and its flipped version share one `SupportDetails`

pub mod config;
pub mod error;
pub mod ewah;
pub mod id_array;
pub mod ledger;
pub mod support;
pub mod tested_in;

pub use config::{CacheConfig, CoexpressionConfig};
pub use error::{ConfigError, LedgerError, SupportDataError};
pub use id_array::{IdArray, IdArrayBacked, MAX_ID};
pub use ledger::{
    AddSummary, CoexpressionLedger, LedgerSnapshot, LinkKey, PersistedSupport, PersistedTestedIn,
    RemovalSummary,
};
pub use support::SupportDetails;
pub use tested_in::{GeneCoexpressionTestedIn, TestedInCache};
