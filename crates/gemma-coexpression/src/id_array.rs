//! Compact set of entity ids with an exact count.
//!
//! Ids map to bit positions by identity, so an id must fit the positions the
//! EWAH blob can hold (`0..=MAX_ID`).

use roaring::RoaringBitmap;
use std::collections::BTreeSet;

use crate::error::SupportDataError;
use crate::ewah;

/// Largest storable id.
pub const MAX_ID: u64 = ewah::MAX_POSITION as u64;

fn position(id: u64) -> Result<u32, SupportDataError> {
    if id > MAX_ID {
        return Err(SupportDataError::IdOutOfRange(id));
    }
    Ok(id as u32)
}

/// Fails for ids that cannot be stored.
pub fn check_id(id: u64) -> Result<(), SupportDataError> {
    position(id).map(|_| ())
}

/// Set of ids backed by a bitmap. Not synchronized: one writer at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdArray {
    bits: RoaringBitmap,
}

impl IdArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = u64>) -> Result<Self, SupportDataError> {
        let mut array = Self::new();
        let ids: Vec<u64> = ids.into_iter().collect();
        array.add_entities(&ids)?;
        Ok(array)
    }

    /// Idempotent.
    pub fn add_entity(&mut self, id: u64) -> Result<(), SupportDataError> {
        self.bits.insert(position(id)?);
        Ok(())
    }

    /// Adds nothing if any id is out of range.
    pub fn add_entities(&mut self, ids: &[u64]) -> Result<(), SupportDataError> {
        let positions = ids
            .iter()
            .map(|&id| position(id))
            .collect::<Result<Vec<u32>, _>>()?;
        self.bits.extend(positions);
        Ok(())
    }

    /// Absent (or unrepresentable) ids are a no-op.
    pub fn remove_entity(&mut self, id: u64) {
        if let Ok(pos) = position(id) {
            self.bits.remove(pos);
        }
    }

    pub fn is_included(&self, id: u64) -> bool {
        position(id).map(|pos| self.bits.contains(pos)).unwrap_or(false)
    }

    pub fn num_ids(&self) -> usize {
        self.bits.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<u64> {
        self.bits.iter().map(u64::from).collect()
    }

    pub fn positions(&self) -> Vec<u32> {
        self.bits.iter().collect()
    }

    /// Ids present in both arrays.
    pub fn and_set(&self, other: &IdArray) -> BTreeSet<u64> {
        (&self.bits & &other.bits).iter().map(u64::from).collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SupportDataError> {
        ewah::encode(&self.bits)
    }

    /// An empty blob is an array that was never written.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SupportDataError> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        Ok(Self {
            bits: ewah::decode(bytes)?,
        })
    }
}

/// Types that carry an [`IdArray`] and expose its operations directly.
pub trait IdArrayBacked {
    fn id_array(&self) -> &IdArray;

    fn id_array_mut(&mut self) -> &mut IdArray;

    fn add_entity(&mut self, id: u64) -> Result<(), SupportDataError> {
        self.id_array_mut().add_entity(id)
    }

    fn add_entities(&mut self, ids: &[u64]) -> Result<(), SupportDataError> {
        self.id_array_mut().add_entities(ids)
    }

    fn remove_entity(&mut self, id: u64) {
        self.id_array_mut().remove_entity(id)
    }

    fn is_included(&self, id: u64) -> bool {
        self.id_array().is_included(id)
    }

    fn num_ids(&self) -> usize {
        self.id_array().num_ids()
    }

    fn ids(&self) -> Vec<u64> {
        self.id_array().ids()
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SupportDataError> {
        self.id_array().to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_remove_single() {
        let mut array = IdArray::new();
        array.add_entity(1094).unwrap();
        assert_eq!(array.num_ids(), 1);
        assert!(array.is_included(1094));

        array.remove_entity(1094);
        assert_eq!(array.num_ids(), 0);
        assert!(!array.is_included(1094));
    }

    #[test]
    fn test_bulk_add_then_more() {
        let mut array = IdArray::new();
        array
            .add_entities(&[5, 15, 2, 235, 775, 54, 3, 23, 98])
            .unwrap();
        array.add_entity(98).unwrap();
        array.add_entity(1000).unwrap();
        for id in [5, 15, 2, 235, 775, 54, 3, 23, 98, 1000] {
            assert!(array.is_included(id), "{id} missing");
        }
        assert_eq!(array.num_ids(), 10);
        assert_eq!(array.ids(), vec![2, 3, 5, 15, 23, 54, 98, 235, 775, 1000]);
    }

    #[test]
    fn test_idempotent_add_and_absent_remove() {
        let mut array = IdArray::from_ids([7, 9]).unwrap();
        array.add_entity(7).unwrap();
        assert_eq!(array.num_ids(), 2);
        array.remove_entity(8);
        array.remove_entity(MAX_ID + 10);
        assert_eq!(array.num_ids(), 2);
    }

    #[test]
    fn test_bulk_add_is_all_or_nothing() {
        let mut array = IdArray::new();
        let err = array.add_entities(&[1, 2, MAX_ID + 1]).unwrap_err();
        assert_eq!(err, SupportDataError::IdOutOfRange(MAX_ID + 1));
        assert!(array.is_empty());
        assert!(!array.is_included(MAX_ID + 1));
    }

    #[test]
    fn test_and_set() {
        let a = IdArray::from_ids([1, 2, 3, 400]).unwrap();
        let b = IdArray::from_ids([2, 400, 500]).unwrap();
        assert_eq!(a.and_set(&b).into_iter().collect::<Vec<_>>(), vec![2, 400]);
    }

    #[test]
    fn test_bytes_round_trip() {
        let array = IdArray::from_ids([5, 15, 2, 235, 775, 54, 3, 23, 98, 1000]).unwrap();
        let restored = IdArray::from_bytes(&array.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, array);
    }

    #[test]
    fn test_empty_blob_is_empty_array() {
        assert!(IdArray::from_bytes(&[]).unwrap().is_empty());
        assert!(matches!(
            IdArray::from_bytes(&[0, 0, 0]),
            Err(SupportDataError::Corrupt(_))
        ));
    }
}
