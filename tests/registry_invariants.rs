use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use edu_inventory_lib::{
    local_store::LocalStore,
    mirror::{Mirror, MIRROR_STATUS},
    validation::{validate_form, ValidationError},
    AppError, AssetRegistry, DuplicateKind, RegistryError,
};
#[path = "util.rs"]
mod util;

use util::{input, FailingStore, RecordingMirror};

#[tokio::test]
async fn create_then_list_contains_exactly_one_equal_record() -> Result<()> {
    let store = util::memory_store().await;
    let mut registry = AssetRegistry::open(store.clone(), Vec::new()).await?;

    let outcome = registry.create(input("SN1", "100")).await?;
    assert!(outcome.fully_mirrored());
    assert!(!outcome.record.registered_at.is_empty());

    let matching: Vec<_> = registry
        .list()
        .iter()
        .filter(|r| r.serial_number == "SN1")
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0], &outcome.record);
    assert_eq!(matching[0].location, "E.M.E.F. Barão de Santo Ângelo");

    assert_eq!(store.get_all().await?, vec![outcome.record]);
    Ok(())
}

#[tokio::test]
async fn duplicate_serial_mutates_nothing() -> Result<()> {
    let store = util::memory_store().await;
    let mirror = Arc::new(RecordingMirror::default());
    let mirrors: Vec<Arc<dyn Mirror>> = vec![mirror.clone()];
    let mut registry = AssetRegistry::open(store.clone(), mirrors).await?;

    registry.create(input("SN1", "100")).await?;
    let err = registry.create(input("SN1", "200")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::DuplicateAsset(DuplicateKind::SerialNumber)
    ));

    assert_eq!(registry.list().len(), 1);
    assert_eq!(registry.list()[0].asset_tag, "100");
    assert_eq!(store.get_all().await?.len(), 1);
    assert_eq!(mirror.seen(), vec!["SN1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn duplicate_asset_tag_has_its_own_message() -> Result<()> {
    let store = util::memory_store().await;
    let mut registry = AssetRegistry::open(store, Vec::new()).await?;
    registry.create(input("SN1", "100")).await?;

    let serial = AppError::from(registry.create(input("SN1", "300")).await.unwrap_err());
    let tag = AppError::from(registry.create(input("SN2", "100")).await.unwrap_err());
    let both = AppError::from(registry.create(input("SN1", "100")).await.unwrap_err());

    assert_eq!(serial.code(), "REGISTRY/DUPLICATE_SERIAL");
    assert_eq!(tag.code(), "REGISTRY/DUPLICATE_ASSET_TAG");
    assert_eq!(both.code(), "REGISTRY/DUPLICATE_BOTH");
    assert_ne!(serial.message(), tag.message());
    assert_ne!(tag.message(), both.message());
    assert!(tag.is_duplicate());
    assert_eq!(registry.list().len(), 1);
    Ok(())
}

#[tokio::test]
async fn serials_and_tags_stay_pairwise_distinct() -> Result<()> {
    let store = util::memory_store().await;
    let mut registry = AssetRegistry::open(store, Vec::new()).await?;

    let attempts = [
        ("SN1", "1"),
        ("SN2", "2"),
        ("SN1", "3"),
        ("SN3", "2"),
        ("SN4", "4"),
        ("SN4", "4"),
        ("SN5", "5"),
    ];
    for (serial, tag) in attempts {
        let _ = registry.create(input(serial, tag)).await;
    }
    registry.delete("SN2").await?;
    registry.create(input("SN6", "2")).await?;

    let serials: HashSet<_> = registry.list().iter().map(|r| &r.serial_number).collect();
    let tags: HashSet<_> = registry.list().iter().map(|r| &r.asset_tag).collect();
    assert_eq!(serials.len(), registry.list().len());
    assert_eq!(tags.len(), registry.list().len());
    assert_eq!(registry.list().len(), 4);
    Ok(())
}

#[tokio::test]
async fn delete_removes_and_second_delete_is_a_no_op() -> Result<()> {
    let store = util::memory_store().await;
    let mut registry = AssetRegistry::open(store.clone(), Vec::new()).await?;
    registry.create(input("SN1", "100")).await?;
    registry.create(input("SN2", "200")).await?;

    assert!(registry.delete("SN1").await?);
    assert!(registry.get("SN1").is_none());
    assert!(!registry.delete("SN1").await?);
    assert_eq!(registry.list().len(), 1);
    assert_eq!(store.get_all().await?.len(), 1);
    Ok(())
}

#[test]
fn non_numeric_tag_never_reaches_the_registry() {
    let err = validate_form(&util::form("SN1", "12a3")).unwrap_err();
    assert_eq!(err, ValidationError::AssetTagNotNumeric("12a3".into()));
    assert!(AppError::from(err).is_validation());
}

#[tokio::test]
async fn failing_mirror_is_a_warning_not_a_failure() -> Result<()> {
    let store = util::memory_store().await;
    let mirror = Arc::new(RecordingMirror::failing());
    let mirrors: Vec<Arc<dyn Mirror>> = vec![mirror.clone()];
    let mut registry = AssetRegistry::open(store.clone(), mirrors).await?;

    let outcome = registry.create(input("SN1", "100")).await?;
    assert_eq!(outcome.mirror_failures.len(), 1);
    assert_eq!(outcome.mirror_failures[0].sink, "recording");
    assert_eq!(outcome.mirror_failures[0].error.code(), MIRROR_STATUS);

    assert_eq!(registry.list().len(), 1);
    assert_eq!(store.get_all().await?.len(), 1);
    assert_eq!(mirror.seen(), vec!["SN1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn local_store_failure_leaves_working_set_and_mirrors_alone() -> Result<()> {
    let mirror = Arc::new(RecordingMirror::default());
    let mirrors: Vec<Arc<dyn Mirror>> = vec![mirror.clone()];
    let mut registry = AssetRegistry::open(Arc::new(FailingStore), mirrors).await?;

    let err = registry.create(input("SN1", "100")).await.unwrap_err();
    assert!(matches!(err, RegistryError::LocalStore(_)));
    assert_eq!(AppError::from(err).code(), "LOCAL/PUT");
    assert!(registry.list().is_empty());
    assert!(mirror.seen().is_empty());
    Ok(())
}

#[tokio::test]
async fn working_set_is_loaded_once_from_the_store() -> Result<()> {
    let store = util::memory_store().await;
    {
        let mut first = AssetRegistry::open(store.clone(), Vec::new()).await?;
        first.create(input("SN1", "100")).await?;
    }
    let mut second = AssetRegistry::open(store.clone(), Vec::new()).await?;
    assert_eq!(second.list().len(), 1);

    let err = second.create(input("SN9", "100")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::DuplicateAsset(DuplicateKind::AssetTag)
    ));
    Ok(())
}
