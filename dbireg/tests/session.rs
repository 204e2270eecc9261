//! The reserved session database.

mod common;

use std::path::Path;

use common::{registry_with, CountingFactory};
use dbireg::{is_connectable, DbiRef, DbiRegistry, EngineId, Error, SESSION_TMP_DBI_ALIAS};
use tempfile::tempdir;

fn registry() -> DbiRegistry {
    DbiRegistry::builder().disable_sweep().build().unwrap()
}

#[test]
fn test_shutdown_before_init_is_not_initialized() {
    let registry = registry();
    let err = registry.shutdown_session().unwrap_err();
    assert!(err.is_not_initialized());
}

#[test]
fn test_session_lifecycle() {
    let registry = registry();
    let dbi_ref = registry.session_dbi_ref().unwrap();
    assert!(registry.is_session_open());
    // The dedicated connection keeps the alias attached.
    assert_eq!(registry.tmp_dbi_users(SESSION_TMP_DBI_ALIAS), Some(1));
    assert!(Path::new(&dbi_ref.dbi_id).is_file());

    let again = registry.session_dbi_ref().unwrap();
    assert_eq!(dbi_ref, again);
    assert_eq!(registry.pool().active_count(), 1);

    let id = registry.shutdown_session().unwrap();
    assert_eq!(id, dbi_ref.dbi_id);
    assert!(!registry.is_session_open());
    assert_eq!(registry.pool().active_count(), 0);
    // The file survives so the caller can archive it.
    assert!(Path::new(&id).is_file());

    assert!(matches!(
        registry.shutdown_session(),
        Err(Error::NotInitialized { .. })
    ));
}

#[test]
fn test_session_not_reopened_after_shutdown() {
    let registry = registry();
    registry.session_dbi_ref().unwrap();
    registry.shutdown_session().unwrap();

    registry.session_dbi_ref().unwrap();
    assert!(!registry.is_session_open());
    assert!(registry.shutdown_session().unwrap_err().is_not_initialized());
}

#[test]
fn test_session_initialized_once_across_threads() {
    let (registry, counters) = registry_with(CountingFactory::exclusive("exclusive"));
    let engine = EngineId::from("exclusive");

    let refs: Vec<DbiRef> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let dbi_ref = registry
                        .attach_tmp_dbi_with(SESSION_TMP_DBI_ALIAS, &engine)
                        .unwrap();
                    registry.detach_tmp_dbi(SESSION_TMP_DBI_ALIAS).unwrap();
                    dbi_ref
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(refs.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(registry.tmp_dbi_users(SESSION_TMP_DBI_ALIAS), Some(1));
    assert_eq!(registry.pool().active_count(), 1);
    assert_eq!(counters.created(), 1);
}

#[test]
fn test_session_override_is_used_and_kept() {
    let dir = tempdir().unwrap();
    let session_path = dir.path().join("previous.dbiregdb");

    let registry = DbiRegistry::builder()
        .session_db(session_path.display().to_string())
        .disable_sweep()
        .build()
        .unwrap();
    let dbi_ref = registry.session_dbi_ref().unwrap();
    assert_eq!(Path::new(&dbi_ref.dbi_id), session_path);
    assert!(is_connectable(registry.pool(), &dbi_ref, false));

    drop(registry);
    assert!(session_path.is_file(), "an override database is never deleted");
}

#[test]
fn test_unusable_override_falls_back_to_tmp_file() {
    let dir = tempdir().unwrap();
    let garbage = dir.path().join("garbage.dbiregdb");
    std::fs::write(&garbage, vec![0x3C_u8; 4096]).unwrap();

    let registry = DbiRegistry::builder()
        .session_db(garbage.display().to_string())
        .disable_sweep()
        .build()
        .unwrap();
    let dbi_ref = registry.session_dbi_ref().unwrap();
    assert!(Path::new(&dbi_ref.dbi_id).starts_with(registry.tmp_dir()));
}

#[test]
fn test_failed_session_init_rolls_back() {
    let (registry, counters) = registry_with(CountingFactory::exclusive("exclusive"));
    counters.set_fail_init(true);
    let err = registry
        .attach_tmp_dbi_with(SESSION_TMP_DBI_ALIAS, &EngineId::from("exclusive"))
        .unwrap_err();
    assert!(matches!(err, Error::EngineOpen { .. }));
    assert_eq!(registry.tmp_dbi_users(SESSION_TMP_DBI_ALIAS), None);
    assert!(!registry.is_session_open());

    counters.set_fail_init(false);
    registry
        .attach_tmp_dbi_with(SESSION_TMP_DBI_ALIAS, &EngineId::from("exclusive"))
        .unwrap();
    assert!(registry.is_session_open());
    assert_eq!(counters.live(), 1);
}
