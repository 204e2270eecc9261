//! Attach/detach lifecycle of named tmp databases.

mod common;

use std::path::Path;

use common::{registry_with, CountingFactory};
use dbireg::engines::SQLITE_ENGINE_ID;
use dbireg::{DbiRegistry, EngineId, Error, TmpDbiHandle};
use proptest::prelude::*;

fn registry() -> DbiRegistry {
    DbiRegistry::builder().disable_sweep().build().unwrap()
}

#[test]
fn test_attach_twice_detach_twice() {
    let registry = registry();

    let first = registry.attach_tmp_dbi("msa").unwrap();
    let second = registry.attach_tmp_dbi("msa").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.engine, EngineId::from(SQLITE_ENGINE_ID));

    let path = Path::new(&first.dbi_id).to_path_buf();
    assert!(path.is_file());

    registry.detach_tmp_dbi("msa").unwrap();
    assert!(path.is_file(), "first detach must keep the file");
    assert_eq!(registry.tmp_dbi_users("msa"), Some(1));

    registry.detach_tmp_dbi("msa").unwrap();
    assert!(!path.exists(), "last detach must delete the file");
    assert!(registry.list_tmp_dbis().is_empty());
}

#[test]
fn test_distinct_aliases_get_distinct_files() {
    let registry = registry();
    let a = registry.attach_tmp_dbi("a").unwrap();
    let b = registry.attach_tmp_dbi("b").unwrap();
    assert_ne!(a.dbi_id, b.dbi_id);

    registry.detach_tmp_dbi("a").unwrap();
    assert!(!Path::new(&a.dbi_id).exists());
    assert!(Path::new(&b.dbi_id).exists());
}

#[test]
fn test_reattach_after_release_allocates_fresh_file() {
    let registry = registry();
    let first = registry.attach_tmp_dbi("cycle").unwrap();
    registry.detach_tmp_dbi("cycle").unwrap();
    let second = registry.attach_tmp_dbi("cycle").unwrap();
    assert_ne!(first.dbi_id, second.dbi_id);
    registry.detach_tmp_dbi("cycle").unwrap();
}

#[test]
fn test_detach_unknown_alias_is_noop() {
    let registry = registry();
    registry.attach_tmp_dbi("kept").unwrap();
    registry.detach_tmp_dbi("missing").unwrap();
    assert_eq!(registry.tmp_dbi_users("kept"), Some(1));
}

#[test]
fn test_unknown_engine_leaves_nothing_behind() {
    let registry = registry();
    let err = registry
        .attach_tmp_dbi_with("x", &EngineId::from("postgres"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFactory { ref engine } if engine == "postgres"));
    assert!(registry.list_tmp_dbis().is_empty());
    assert_eq!(std::fs::read_dir(registry.tmp_dir()).unwrap().count(), 0);
}

#[test]
fn test_detach_closes_open_handles() {
    let (registry, counters) = registry_with(CountingFactory::shareable("shared"));
    let engine = EngineId::from("shared");
    let dbi_ref = registry.attach_tmp_dbi_with("work", &engine).unwrap();

    let handle = registry.pool().open(&dbi_ref, true).unwrap();
    registry.pool().release(&handle).unwrap();
    assert_eq!(counters.live(), 1);

    registry.detach_tmp_dbi("work").unwrap();
    assert_eq!(counters.live(), 0);
    assert_eq!(registry.pool().suspended_count(&dbi_ref), 0);
}

#[test]
fn test_scoped_handle_detaches() {
    let registry = registry();
    let path = {
        let handle = TmpDbiHandle::new(&registry, "scoped").unwrap();
        Path::new(&handle.dbi_ref().dbi_id).to_path_buf()
    };
    assert!(!path.exists());
    assert_eq!(registry.tmp_dbi_users("scoped"), None);
}

#[test]
fn test_teardown_cleans_everything() {
    let (registry, counters) = registry_with(CountingFactory::shareable("shared"));
    let sqlite = registry.attach_tmp_dbi("leaked").unwrap();
    registry.attach_tmp_dbi("leaked").unwrap();
    let shared = registry
        .attach_tmp_dbi_with("leaked-too", &EngineId::from("shared"))
        .unwrap();
    let handle = registry.pool().open(&shared, true).unwrap();
    registry.pool().release(&handle).unwrap();
    registry.session_dbi_ref().unwrap();
    let tmp_dir = registry.tmp_dir().to_path_buf();

    drop(registry);

    assert!(!Path::new(&sqlite.dbi_id).exists());
    assert!(!tmp_dir.exists());
    assert_eq!(counters.live(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    // Any balanced sequence of attaches and detaches over a few aliases ends
    // with an empty registry and no files left in the tmp area.
    #[test]
    fn prop_balanced_sequences_leave_nothing(ops in prop::collection::vec((0usize..3, any::<bool>()), 0..40)) {
        let registry = registry();
        let aliases = ["a", "b", "c"];
        let mut attached = [0usize; 3];

        for (which, attach) in ops {
            let alias = aliases[which];
            if attach {
                registry.attach_tmp_dbi(alias).unwrap();
                attached[which] += 1;
            } else if attached[which] > 0 {
                registry.detach_tmp_dbi(alias).unwrap();
                attached[which] -= 1;
            }
            let expected = (attached[which] > 0).then_some(attached[which]);
            prop_assert_eq!(registry.tmp_dbi_users(alias), expected);
        }

        for (which, count) in attached.iter().enumerate() {
            for _ in 0..*count {
                registry.detach_tmp_dbi(aliases[which]).unwrap();
            }
        }

        prop_assert!(registry.list_tmp_dbis().is_empty());
        let leftovers: Vec<_> = std::fs::read_dir(registry.tmp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "dbiregdb"))
            .collect();
        prop_assert!(leftovers.is_empty());
    }
}

#[test]
fn test_teardown_continues_past_failed_shutdown() {
    let (registry, counters) = registry_with(CountingFactory::shareable("flaky"));

    let broken = registry
        .attach_tmp_dbi_with("broken", &EngineId::from("flaky"))
        .unwrap();
    assert!(Path::new(&broken.dbi_id).is_file());
    let handle = registry.pool().open(&broken, true).unwrap();
    registry.pool().release(&handle).unwrap();
    assert_eq!(registry.pool().suspended_count(&broken), 1);

    let healthy = registry.attach_tmp_dbi("healthy").unwrap();
    assert!(Path::new(&healthy.dbi_id).is_file());

    counters.set_fail_shutdown(true);
    drop(registry);

    assert_eq!(counters.shut_down(), 0);
    assert!(!Path::new(&broken.dbi_id).exists());
    assert!(!Path::new(&healthy.dbi_id).exists());
}

#[test]
fn test_failed_allocation_removes_reserved_file() {
    let (registry, counters) = registry_with(CountingFactory::file_backed("strict"));
    counters.set_fail_init(true);

    let err = registry
        .attach_tmp_dbi_with("doomed", &EngineId::from("strict"))
        .unwrap_err();
    assert!(matches!(err, Error::EngineOpen { .. }));
    assert_eq!(registry.tmp_dbi_users("doomed"), None);

    let leftovers = std::fs::read_dir(registry.tmp_dir()).unwrap().count();
    assert_eq!(leftovers, 0);
}
