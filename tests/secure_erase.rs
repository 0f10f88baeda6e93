// Secure-erase behavior observed through an instrumented allocator.
//
// The recorder snapshots each block as it is handed back, so these tests
// see exactly what a later owner of that memory would see.
mod common;

use common::Recorder;
use seeded_chainmap::{ChainMap, MapConfig};

fn secure_map(rec: &std::sync::Arc<Recorder>) -> ChainMap<u32> {
    ChainMap::with_config(MapConfig::new().allocator(rec.clone()).secure(true)).unwrap()
}

// Test: secret keys do not survive free.
// Verifies: after secure free no released block contains the key bytes
// and every released block is zero.
#[test]
fn secure_free_leaves_no_key_bytes() {
    let rec = Recorder::new();
    let mut m = secure_map(&rec);
    m.set("token", 0xdead_beef).unwrap();
    m.set("password=hunter2", 1).unwrap();
    m.free();

    let releases = rec.releases();
    assert!(!releases.is_empty());
    assert!(releases.iter().all(|r| r.all_zero()));
    assert!(releases.iter().all(|r| !r.contains(b"token")));
    assert_eq!(rec.outstanding(), 0);
}

// Test: a plain map is observably different.
// Verifies: without secure mode the key bytes are still in the block.
#[test]
fn plain_free_leaves_key_bytes() {
    let rec = Recorder::new();
    let mut m: ChainMap<u32> = ChainMap::with_config(MapConfig::new().allocator(rec.clone())).unwrap();
    m.set("token", 1).unwrap();
    m.free();
    assert!(rec.releases().iter().any(|r| r.contains(b"token")));
}

// Test: secure_free on a plain map.
// Verifies: the one-shot override wipes just like a secure map would.
#[test]
fn secure_free_on_plain_map() {
    let rec = Recorder::new();
    let mut m: ChainMap<u32> = ChainMap::with_config(MapConfig::new().allocator(rec.clone())).unwrap();
    m.set("token", 1).unwrap();
    m.secure_free();
    assert!(rec.releases().iter().all(|r| r.all_zero()));
}

// Test: remove, clear and drop in secure mode.
// Verifies: every path that releases memory wipes it first.
#[test]
fn every_release_path_wipes() {
    let rec = Recorder::new();
    {
        let mut m = secure_map(&rec);
        m.set("removed", 1).unwrap();
        m.set("cleared", 2).unwrap();
        m.remove("removed").unwrap();
        m.clear();
        m.set("dropped", 3).unwrap();
    }
    let releases = rec.releases();
    assert_eq!(
        releases.len(),
        5,
        "three keys, the node pool and the bucket array"
    );
    assert!(releases.iter().all(|r| r.all_zero()));
}

// Test: secure growth.
// Verifies: bucket arrays are never reallocated in place and the
// superseded arrays are wiped.
#[test]
fn secure_growth_avoids_reallocate() {
    let rec = Recorder::new();
    let mut m = secure_map(&rec);
    for i in 0..200 {
        m.set(&format!("secret-{i}"), i).unwrap();
    }
    assert_eq!(rec.reallocations(), 0);
    assert!(rec.releases().iter().all(|r| r.all_zero()));
    assert!(m.is_secure());
    for i in 0..200 {
        assert_eq!(m.get(&format!("secret-{i}")), Some(&i));
    }
}

// Test: values stored in entry nodes.
// Assumes: a value pattern that never appears in keys or links.
// Verifies: neither a removed entry's node slot nor the node pool block
// hands the value back to the allocator; the pool block itself is among the
// releases.
#[test]
fn values_never_reach_released_memory() {
    const MARK: u64 = 0x5ec2_e7ca_fe0d_d1e5;
    let rec = Recorder::new();
    let mut m: ChainMap<u64> =
        ChainMap::with_config(MapConfig::new().allocator(rec.clone()).secure(true)).unwrap();
    m.set("token", MARK).unwrap();
    assert_eq!(m.remove("token"), Ok(MARK));
    m.set("other", MARK).unwrap();
    m.clear();
    m.set("again", MARK).unwrap();
    m.free();

    let releases = rec.releases();
    assert_eq!(
        releases.len(),
        5,
        "three keys, the node pool and the bucket array"
    );
    assert!(releases.iter().all(|r| !r.contains(&MARK.to_ne_bytes())));
    assert!(releases.iter().all(|r| r.all_zero()));
    assert_eq!(rec.outstanding(), 0);
}

// Test: the same sequence on a plain map.
// Verifies: the node pool is released through the configured allocator
// without a wipe, so the secure path above is what removes the value.
#[test]
fn plain_node_pool_keeps_values() {
    const MARK: u64 = 0x5ec2_e7ca_fe0d_d1e5;
    let rec = Recorder::new();
    let mut m: ChainMap<u64> =
        ChainMap::with_config(MapConfig::new().allocator(rec.clone())).unwrap();
    m.set("token", MARK).unwrap();
    m.set("other", MARK).unwrap();
    m.free();
    assert!(rec.releases().iter().any(|r| r.contains(&MARK.to_ne_bytes())));
}
