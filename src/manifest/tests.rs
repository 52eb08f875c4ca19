use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use filetime::{FileTime, set_file_mtime};
use tempfile::TempDir;

use crate::error::StevedoreError;
use crate::job::ArgKind;
use crate::logging::Logger;
use crate::manifest::{
    MANIFEST_FILE, MANIFEST_VERSION, Manifest, ManifestRecord, SlotChange, SlotValue, discard,
};
use crate::product::Product;
use crate::value::{Value, meta};

fn write(dir: &Path, name: &str, content: &str) -> Product {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_000, 0)).unwrap();
    Product::with_dst(&path, name)
}

fn changed(change: &SlotChange<'_>) -> bool {
    change.is_changed()
}

#[test]
fn test_load_nonexistent_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let mut manifest = Manifest::new(temp_dir.path());
    assert!(!manifest.load(Logger::silent()).unwrap());
    assert!(manifest.result().is_none());
    assert_eq!(manifest.slots().count(), 0);
}

#[test]
fn test_empty_manifest_file_is_no_state() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(MANIFEST_FILE), b"").unwrap();
    let mut manifest = Manifest::new(temp_dir.path());
    assert!(!manifest.load(Logger::silent()).unwrap());
}

#[test]
fn test_persist_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let a = write(inputs.path(), "a.txt", "alpha").update(meta([
        ("nested", Value::from(meta([("deep", Value::from(vec![1, 2]))]))),
        ("flag", Value::Bool(true)),
    ]));
    let b = write(inputs.path(), "b.txt", "beta");
    let c = write(inputs.path(), "c.txt", "gamma");

    let job_dir = temp_dir.path().join("job-000");
    let mut manifest = Manifest::new(&job_dir);
    manifest
        .update("src", SlotValue::Product(a.clone()), changed)
        .unwrap();
    manifest
        .update("srcs", SlotValue::Products(vec![b.clone(), c.clone()]), changed)
        .unwrap();
    manifest
        .update("isrcs", SlotValue::IncrementalProducts(vec![c.clone()]), changed)
        .unwrap();
    manifest
        .update("opt", SlotValue::Option(Value::from("x")), changed)
        .unwrap();
    manifest.set_result(vec![a.clone()]).unwrap();
    manifest
        .meta_mut()
        .insert("counter".to_string(), Value::Int(3));
    manifest.persist().unwrap();

    assert!(job_dir.join(MANIFEST_FILE).exists());
    assert!(!job_dir.join(".manifest.tmp").exists());

    let loaded = Manifest::open(&job_dir, Logger::silent()).unwrap();
    assert_eq!(loaded.slot("src"), manifest.slot("src"));
    assert_eq!(loaded.slot("srcs"), manifest.slot("srcs"));
    assert_eq!(loaded.slot("isrcs"), manifest.slot("isrcs"));
    assert_eq!(
        loaded.slot("opt").unwrap().value(),
        &SlotValue::Option(Value::from("x"))
    );
    assert_eq!(loaded.result(), Some(&[a.clone()][..]));
    assert_eq!(loaded.result_digests(), manifest.result_digests());
    assert_eq!(loaded.meta().get("counter"), Some(&Value::Int(3)));

    let restored = &loaded.result().unwrap()[0];
    assert_eq!(restored.meta(), a.meta());
}

#[test]
fn test_update_reports_every_call() {
    let temp_dir = TempDir::new().unwrap();
    let product = write(temp_dir.path(), "a.txt", "alpha");
    let mut manifest = Manifest::new(temp_dir.path());

    let first = manifest
        .update("srcs", SlotValue::Products(vec![product.clone()]), |change| {
            assert_eq!(change.name(), "srcs");
            assert_eq!(change.kind(), ArgKind::Products);
            (change.old().is_none(), change.is_changed())
        })
        .unwrap();
    assert_eq!(first, (true, true));

    let second = manifest
        .update("srcs", SlotValue::Products(vec![product.clone()]), |change| {
            (change.old().is_some(), change.is_changed())
        })
        .unwrap();
    assert_eq!(second, (true, false));

    fs::write(product.src(), "changed").unwrap();
    let third = manifest
        .update("srcs", SlotValue::Products(vec![product]), changed)
        .unwrap();
    assert!(third);
}

#[test]
fn test_reordering_products_is_not_a_change() {
    let temp_dir = TempDir::new().unwrap();
    let a = write(temp_dir.path(), "a.txt", "a");
    let b = write(temp_dir.path(), "b.txt", "b");
    let mut manifest = Manifest::new(temp_dir.path());

    manifest
        .update("srcs", SlotValue::Products(vec![a.clone(), b.clone()]), changed)
        .unwrap();
    let reordered = manifest
        .update("srcs", SlotValue::Products(vec![b, a]), changed)
        .unwrap();
    assert!(!reordered);
}

#[test]
fn test_option_compares_structurally() {
    let temp_dir = TempDir::new().unwrap();
    let mut manifest = Manifest::new(temp_dir.path());
    let nested = || Value::from(meta([("list", Value::from(vec!["a", "b"]))]));

    assert!(
        manifest
            .update("opt", SlotValue::Option(nested()), changed)
            .unwrap()
    );
    assert!(
        !manifest
            .update("opt", SlotValue::Option(nested()), changed)
            .unwrap()
    );
    assert!(
        manifest
            .update("opt", SlotValue::Option(Value::from(vec!["a"])), changed)
            .unwrap()
    );
}

#[test]
fn test_incremental_delta() {
    let temp_dir = TempDir::new().unwrap();
    let a = write(temp_dir.path(), "a.txt", "a");
    let b = write(temp_dir.path(), "b.txt", "b");
    let mut manifest = Manifest::new(temp_dir.path());

    manifest
        .update(
            "isrcs",
            SlotValue::IncrementalProducts(vec![a.clone(), b.clone()]),
            |change| change.delta(),
        )
        .unwrap();

    fs::write(b.src(), "b2").unwrap();
    let c = write(temp_dir.path(), "c.txt", "c");
    let delta = manifest
        .update(
            "isrcs",
            SlotValue::IncrementalProducts(vec![b.clone(), c.clone()]),
            |change| change.delta(),
        )
        .unwrap();

    assert_eq!(delta.missing, vec![a]);
    assert_eq!(delta.added, vec![c]);
    assert_eq!(delta.updated, vec![b]);
}

#[test]
fn test_missing_product_fails_update() {
    let temp_dir = TempDir::new().unwrap();
    let mut manifest = Manifest::new(temp_dir.path());
    let err = manifest
        .update(
            "src",
            SlotValue::Product(Product::new(temp_dir.path().join("gone.txt"))),
            changed,
        )
        .unwrap_err();
    assert!(matches!(err, StevedoreError::FileNotFound(_)));
    assert!(manifest.slot("src").is_none());
}

#[test]
fn test_discard_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = Manifest::new(temp_dir.path());
    manifest.persist().unwrap();
    assert!(manifest.exists());

    manifest.discard().unwrap();
    assert!(!manifest.exists());

    manifest.discard().unwrap();
    discard(&temp_dir.path().join("never-created")).unwrap();
}

#[test]
fn test_corrupted_manifest_resets() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(MANIFEST_FILE);
    fs::write(&path, b"definitely not an rkyv archive").unwrap();

    let mut manifest = Manifest::new(temp_dir.path());
    assert!(!manifest.load(Logger::silent()).unwrap());
    assert!(!path.exists());
}

#[test]
fn test_newer_version_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let record = ManifestRecord {
        version: MANIFEST_VERSION + 1,
        slots: BTreeMap::new(),
        result: None,
        meta: BTreeMap::new(),
    };
    let bytes = rkyv::to_bytes::<rkyv::rancor::BoxedError>(&record).unwrap();
    fs::write(temp_dir.path().join(MANIFEST_FILE), &bytes[..]).unwrap();

    let err = Manifest::open(temp_dir.path(), Logger::silent()).unwrap_err();
    assert!(matches!(err, StevedoreError::ConfigError(_)));
}

#[test]
fn test_read_leaves_corrupted_manifest_alone() {
    let temp_dir = TempDir::new().unwrap();
    assert!(Manifest::read(temp_dir.path()).unwrap().is_none());

    let path = temp_dir.path().join(MANIFEST_FILE);
    fs::write(&path, b"definitely not an rkyv archive").unwrap();
    let err = Manifest::read(temp_dir.path()).unwrap_err();
    assert!(matches!(err, StevedoreError::DeserializationError(_)));
    assert!(path.exists());
}

#[test]
fn test_read_returns_stored_state() {
    let temp_dir = TempDir::new().unwrap();
    let mut manifest = Manifest::new(temp_dir.path());
    manifest
        .update("mode", SlotValue::Option(Value::from("fast")), changed)
        .unwrap();
    manifest.set_result(Vec::new()).unwrap();
    manifest.persist().unwrap();

    let stored = Manifest::read(temp_dir.path()).unwrap().unwrap();
    assert_eq!(
        stored.slot("mode").map(|slot| slot.value()),
        Some(&SlotValue::Option(Value::from("fast")))
    );
    assert_eq!(stored.result(), Some(&[][..]));
}
