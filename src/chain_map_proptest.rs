#![cfg(test)]

// Property tests for ChainMap kept inside the crate so they can drive the
// instrumented allocator and inspect bucket placement.

use crate::alloc::testing::TrackingAllocator;
use crate::chain_map::{ChainMap, Handle};
use crate::config::{Growth, MapConfig};
use crate::error::Error;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    Remove(usize),
    Find(usize),
    Has(String),
    Mutate(usize, i32),
    Iterate,
    Rehash(u8),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let has_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![has_pool.prop_map(|s: String| s), "[a-z]{0,5}".prop_map(|s| s)]
                .prop_map(OpI::Has),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => any::<u8>().prop_map(OpI::Rehash),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives `sut` and a std HashMap model through the same operations.
fn run_state_machine(
    mut sut: ChainMap<i32>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut live: HashMap<String, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();
    let mut buckets = sut.bucket_count();

    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let k = &pool[i];
                let prev = sut.set(k, v).map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(prev, model.insert(k.clone(), v));
                let h = sut.find(k).expect("just set");
                if let Some(&old) = live.get(k) {
                    prop_assert_eq!(h, old, "overwrite keeps the entry");
                }
                live.insert(k.clone(), h);
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                match sut.remove(k) {
                    Ok(v) => {
                        prop_assert_eq!(Some(v), model.remove(k));
                        stale.push(live.remove(k).expect("tracked live handle"));
                    }
                    Err(e) => {
                        prop_assert_eq!(e, Error::NotFound);
                        prop_assert!(!model.contains_key(k));
                    }
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.find(k), live.get(k).copied());
                prop_assert_eq!(sut.get(k), model.get(k));
            }
            OpI::Has(s) => {
                prop_assert_eq!(sut.has(&s), model.contains_key(&s));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(&h) = live.get(k) {
                    let vr = h.value_mut(&mut sut);
                    prop_assert!(vr.is_some(), "live handle should resolve");
                    if let Some(vr) = vr {
                        *vr = vr.wrapping_add(d);
                    }
                    if let Some(mv) = model.get_mut(k) {
                        *mv = mv.wrapping_add(d);
                    }
                }
            }
            OpI::Iterate => {
                let it = sut.iter();
                prop_assert_eq!(it.len(), model.len());
                let mut last_bucket = 0;
                let mut s_keys = BTreeSet::new();
                for (k, v) in it {
                    let b = sut.bucket_of(k).expect("non-empty map has buckets");
                    prop_assert!(b >= last_bucket, "bucket order");
                    last_bucket = b;
                    prop_assert_eq!(Some(v), model.get(k));
                    prop_assert!(s_keys.insert(k.to_string()), "yielded once");
                }
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
            OpI::Rehash(n) => {
                sut.rehash(usize::from(n)).map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                stale.extend(live.drain().map(|(_, h)| h));
            }
        }

        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert!(sut.bucket_count() >= buckets, "buckets never shrink");
        buckets = sut.bucket_count();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `set` returns the previous value exactly when the model had one.
// - `get`/`has`/`find` parity and handle stability across overwrites.
// - `remove` returns the owned value or NotFound, and invalidates the handle.
// - Iteration is bucket-ordered and yields each live entry exactly once.
// - Bucket count never shrinks; `len`/`is_empty` parity after each op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(), seed in any::<u32>()) {
        let sut = ChainMap::with_config(MapConfig::new().seed(seed)).unwrap();
        run_state_machine(sut, &pool, ops)?;
    }
}

// Property: Same invariants with every key in one chain (one bucket, no
// growth), stressing head/middle/tail unlinking and equality resolution.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_single_chain((pool, ops) in arb_scenario()) {
        let sut = ChainMap::with_config(MapConfig::new().buckets(1).growth(Growth::Fixed)).unwrap();
        // Rehash ops still grow a fixed map on explicit request; that is part
        // of the contract under test.
        run_state_machine(sut, &pool, ops)?;
    }
}

// Property: secure maps hand every block back zeroed and release all of
// them by the time the map is dropped.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_secure_release_is_zeroed((pool, ops) in arb_scenario()) {
        let a = TrackingAllocator::new();
        let sut = ChainMap::with_config(
            MapConfig::new().allocator(a.clone()).secure(true).buckets(2),
        ).unwrap();
        run_state_machine(sut, &pool, ops)?;
        prop_assert_eq!(a.live(), 0);
        prop_assert!(a.released().iter().all(|r| r.all_zero));
    }
}
