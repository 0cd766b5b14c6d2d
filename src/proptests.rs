use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    // A narrow alphabet makes shared prefixes, splits and regrown children
    // blocks the common case rather than the exception.
    prop::collection::vec(prop::sample::select(b"abc/".to_vec()), 0..=16)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 50)]
    Write(#[proptest(strategy = "key_strategy()")] Vec<u8>, i64),
    #[proptest(weight = 20)]
    Remove(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 25)]
    Read(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 5)]
    Defrag,
}

fn assert_same_content(t: &Trie, m: &BTreeMap<Vec<u8>, i64>) -> std::result::Result<(), TestCaseError> {
    prop_assert_eq!(t.entries_count(), m.len());
    for (k, v) in m {
        prop_assert_eq!(t.try_read(k), Some(*v));
    }
    let values = t.walk().filter(|e| e.value.is_some()).count();
    prop_assert_eq!(values, m.len());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(
        capacity in MIN_CAPACITY..=2048usize,
        ops in prop::collection::vec(any::<Op>(), 0..=400),
    ) {
        let mut t = Trie::with_capacity(capacity).unwrap();
        let mut m: BTreeMap<Vec<u8>, i64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Write(key, value) => {
                    let before = t.as_bytes().to_vec();
                    match t.write(&key, value) {
                        Ok(()) => {
                            m.insert(key, value);
                        }
                        Err(Error::NotEnoughSpace { .. }) => {
                            prop_assert!(!m.contains_key(&key), "overwrite needs no space");
                            prop_assert_eq!(t.as_bytes(), &before[..], "rejected write left changes");
                        }
                        Err(other) => prop_assert!(false, "unexpected error {}", other),
                    }
                }
                Op::Remove(key) => {
                    prop_assert_eq!(t.remove(&key), m.remove(&key).is_some());
                }
                Op::Read(key) => {
                    prop_assert_eq!(t.try_read(&key), m.get(&key).copied());
                }
                Op::Defrag => {
                    t.defrag();
                    prop_assert_eq!(t.wasted_space(), 0);
                }
            }
            prop_assert_eq!(t.entries_count(), m.len());
        }

        prop_assert_eq!(t.validate(), Ok(()));
        assert_same_content(&t, &m)?;

        t.defrag();
        prop_assert_eq!(t.validate(), Ok(()));
        assert_same_content(&t, &m)?;
    }

    #[test]
    fn prop_defrag_twice_is_stable(
        keys in prop::collection::vec(key_strategy(), 0..=64),
        drop_every in 2usize..5,
    ) {
        let mut t = Trie::new();
        for (i, k) in keys.iter().enumerate() {
            t.write(k, i as i64).unwrap();
        }
        for k in keys.iter().step_by(drop_every) {
            t.remove(k);
        }

        t.defrag();
        let once = t.as_bytes().to_vec();
        let stats = t.stats();
        t.defrag();
        prop_assert_eq!(t.as_bytes(), &once[..]);
        prop_assert_eq!(t.stats(), stats);
        prop_assert_eq!(stats.wasted, 0);
    }

    #[test]
    fn prop_bytes_reload(keys in prop::collection::vec(key_strategy(), 1..=64)) {
        let mut t = Trie::with_capacity(4096).unwrap();
        for (i, k) in keys.iter().enumerate() {
            t.write(k, i as i64).unwrap();
        }
        let copy = Trie::from_bytes(t.as_bytes()).unwrap();
        for k in &keys {
            prop_assert_eq!(copy.try_read(k), t.try_read(k));
        }
    }
}

/// The fill-up scenario on every small capacity: whatever error ends the run,
/// everything written before it stays readable.
#[test]
fn fill_until_full_keeps_earlier_keys() {
    for capacity in (MIN_CAPACITY..=1024).step_by(8) {
        let mut t = Trie::with_capacity(capacity).unwrap();
        let mut i = 0i64;
        let err = loop {
            match t.write(i.to_string(), i) {
                Ok(()) => i += 1,
                Err(err) => break err,
            }
        };
        assert!(
            matches!(err, Error::NotEnoughSpace { .. } | Error::MaxItemsStored),
            "capacity {capacity}: {err}"
        );
        assert_eq!(t.entries_count(), i as usize, "capacity {capacity}");
        for k in 0..i {
            assert_eq!(t.try_read(k.to_string()), Some(k), "capacity {capacity}");
        }
        assert_eq!(t.validate(), Ok(()));
    }
}
