//! Per-link support: which experiments back a gene-gene coexpression link.

use std::fmt;

use crate::error::SupportDataError;
use crate::id_array::{IdArray, IdArrayBacked};

/// Experiments supporting one gene pair with one correlation sign.
///
/// Shared by a link and its flipped version.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportDetails {
    pub id: Option<u64>,
    pub first_gene: u64,
    pub second_gene: u64,
    pub positive_correlation: bool,
    ids: IdArray,
}

impl SupportDetails {
    pub fn new(first_gene: u64, second_gene: u64, positive_correlation: bool) -> Self {
        Self {
            id: None,
            first_gene,
            second_gene,
            positive_correlation,
            ids: IdArray::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Rebuild from a stored blob.
    pub fn from_bytes(
        first_gene: u64,
        second_gene: u64,
        positive_correlation: bool,
        bytes: &[u8],
    ) -> Result<Self, SupportDataError> {
        Ok(Self {
            id: None,
            first_gene,
            second_gene,
            positive_correlation,
            ids: IdArray::from_bytes(bytes)?,
        })
    }

    pub fn num_datasets_supporting(&self) -> usize {
        self.num_ids()
    }
}

impl IdArrayBacked for SupportDetails {
    fn id_array(&self) -> &IdArray {
        &self.ids
    }

    fn id_array_mut(&mut self) -> &mut IdArray {
        &mut self.ids
    }
}

impl fmt::Display for SupportDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SupportDetails[id={}, {}{}{}, support={}]",
            self.id.map(|i| i.to_string()).unwrap_or_else(|| "new".to_string()),
            self.first_gene,
            if self.positive_correlation { "+" } else { "-" },
            self.second_gene,
            self.num_ids()
        )
    }
}
