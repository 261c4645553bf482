use gemma_coexpression::{
    ewah, CoexpressionConfig, CoexpressionLedger, GeneCoexpressionTestedIn, IdArray,
    IdArrayBacked, SupportDataError, SupportDetails, MAX_ID,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ============================================================================
// Bit-vector scenarios
// ============================================================================

#[test]
fn test_single_id_added_and_removed() {
    let mut sd = SupportDetails::new(1, 2, true);
    sd.add_entity(1094).unwrap();
    assert_eq!(sd.num_ids(), 1);
    assert!(sd.is_included(1094));

    sd.remove_entity(1094);
    assert_eq!(sd.num_ids(), 0);
    assert!(!sd.is_included(1094));
}

#[test]
fn test_bulk_add_then_repeat_and_extend() {
    let mut sd = SupportDetails::new(1, 2, true);
    sd.add_entities(&[5, 15, 2, 235, 775, 54, 3, 23, 98]).unwrap();
    sd.add_entity(98).unwrap();
    sd.add_entity(1000).unwrap();

    for id in [5, 15, 2, 235, 775, 54, 3, 23, 98, 1000] {
        assert!(sd.is_included(id), "{id} should be included");
    }
    assert_eq!(sd.num_datasets_supporting(), 10);

    let restored = SupportDetails::from_bytes(1, 2, true, &sd.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.ids(), sd.ids());
}

#[test]
fn test_blob_survives_tested_in_reload() {
    let mut tested_in = GeneCoexpressionTestedIn::new(77);
    tested_in.add_entities(&[0, 63, 64, 127, 128, 4096]).unwrap();
    let bytes = tested_in.to_bytes().unwrap();

    let restored = GeneCoexpressionTestedIn::from_bytes(77, &bytes).unwrap();
    assert_eq!(restored, tested_in);
    assert_eq!(restored.ids(), vec![0, 63, 64, 127, 128, 4096]);
}

#[test]
fn test_largest_id_round_trips() {
    let array = IdArray::from_ids([0, MAX_ID]).unwrap();
    let restored = IdArray::from_bytes(&array.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.ids(), vec![0, MAX_ID]);
    assert!(matches!(
        IdArray::from_ids([MAX_ID + 1]),
        Err(SupportDataError::IdOutOfRange(_))
    ));
}

#[test]
fn test_truncated_blob_is_corrupt() {
    let array = IdArray::from_ids([3, 5, 700, 70_000]).unwrap();
    let bytes = array.to_bytes().unwrap();
    for len in 1..bytes.len() {
        assert!(
            matches!(
                IdArray::from_bytes(&bytes[..len]),
                Err(SupportDataError::Corrupt(_))
            ),
            "prefix of length {len} decoded"
        );
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[test]
fn test_ledger_file_round_trip() {
    init_tracing();
    let mut ledger = CoexpressionLedger::new(CoexpressionConfig::default());
    ledger
        .add_support(10, &[(100, 200, true), (100, 300, false)])
        .unwrap();
    ledger.add_support(11, &[(200, 100, true)]).unwrap();
    ledger.update_tested_in(10, &[100, 200, 300]).unwrap();
    ledger.update_tested_in(11, &[100, 200]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    ledger.save_json(&path).unwrap();

    let loaded = CoexpressionLedger::load_json(&path, CoexpressionConfig::default()).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.num_datasets_supporting(100, 200, true), 2);
    assert_eq!(loaded.num_datasets_supporting(300, 100, false), 1);
    assert_eq!(loaded.links_for_gene(100).len(), 2);
    assert_eq!(
        loaded.tested_in_datasets(100, 200).unwrap(),
        BTreeSet::from([10, 11])
    );
    assert_eq!(
        loaded.tested_in_datasets(200, 300).unwrap(),
        BTreeSet::from([10])
    );
}

#[test]
fn test_ledger_load_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, b"{not json").unwrap();
    assert!(CoexpressionLedger::load_json(&path, CoexpressionConfig::default()).is_err());
    assert!(
        CoexpressionLedger::load_json(dir.path().join("missing.json"), CoexpressionConfig::default())
            .is_err()
    );
}

#[test]
fn test_removing_last_experiment_leaves_zero_support_link() {
    init_tracing();
    let mut ledger = CoexpressionLedger::new(CoexpressionConfig::default());
    ledger.add_support(10, &[(1, 2, true)]).unwrap();
    let summary = ledger.remove_experiment(10);
    assert_eq!(summary.zero_support, 1);
    assert_eq!(ledger.num_datasets_supporting(1, 2, true), 0);

    // The experiment can support the link again after removal.
    ledger.add_support(10, &[(2, 1, true)]).unwrap();
    assert_eq!(ledger.num_datasets_supporting(1, 2, true), 1);
}

// ============================================================================
// Properties
// ============================================================================

fn id_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![0u64..2_000, 0u64..=MAX_ID]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_added_ids_are_counted_and_included(ids in prop::collection::btree_set(id_strategy(), 0..200)) {
        let list: Vec<u64> = ids.iter().copied().collect();
        let array = IdArray::from_ids(list).unwrap();
        prop_assert_eq!(array.num_ids(), ids.len());
        for id in &ids {
            prop_assert!(array.is_included(*id));
        }
    }

    #[test]
    fn prop_add_then_remove_leaves_empty(ids in prop::collection::btree_set(id_strategy(), 1..100)) {
        let mut array = IdArray::new();
        for id in &ids {
            array.add_entity(*id).unwrap();
        }
        for id in &ids {
            array.remove_entity(*id);
            prop_assert!(!array.is_included(*id));
        }
        prop_assert_eq!(array.num_ids(), 0);
    }

    #[test]
    fn prop_repeated_add_and_absent_remove_change_nothing(
        ids in prop::collection::btree_set(0u64..5_000, 1..50),
        absent in 5_000u64..10_000,
    ) {
        let list: Vec<u64> = ids.iter().copied().collect();
        let once = IdArray::from_ids(list.clone()).unwrap();
        let mut twice = once.clone();
        twice.add_entities(&list).unwrap();
        prop_assert_eq!(&twice, &once);

        twice.remove_entity(absent);
        prop_assert_eq!(twice.num_ids(), once.num_ids());
    }

    #[test]
    fn prop_blob_round_trip_recovers_ids(ids in prop::collection::btree_set(id_strategy(), 0..300)) {
        let array = IdArray::from_ids(ids.iter().copied()).unwrap();
        let restored = IdArray::from_bytes(&array.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(restored.ids(), ids.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..96)) {
        let _ = ewah::decode(&bytes);
    }
}
