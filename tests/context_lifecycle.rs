/// Integration tests for building, persisting and fetching contexts
///
/// These run the library against a real `FilesystemStore` in a temp
/// directory, the way the CLI does.
mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

use common::{fraud_files, FRAUD_APP};
use strata::{
    AppConfig, ContextBuilder, ContextStore, ErrorKind, FilesystemStore, KeyNamespace,
    MemoryStore, ObjectStore,
};

fn fraud_config() -> AppConfig {
    AppConfig::from_toml_str(FRAUD_APP).unwrap()
}

#[test]
fn test_build_persist_fetch_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FilesystemStore::open(dir.path()).unwrap());
    let builder = ContextBuilder::new(KeyNamespace::default(), store.clone()).unwrap();
    let gateway = ContextStore::new(store.clone(), KeyNamespace::default());

    let ctx = builder.build(&fraud_config(), &fraud_files(), false).unwrap();

    assert_eq!(ctx.python_packages.len(), 1);
    assert_eq!(ctx.user_aggregators.len(), 1);
    assert_eq!(ctx.constants.len(), 1);
    assert_eq!(ctx.aggregators.len(), 5);
    assert_eq!(ctx.transformers.len(), 2);
    assert_eq!(ctx.raw_columns.len(), 3);
    assert_eq!(ctx.aggregates.len(), 5);
    assert_eq!(ctx.transformed_columns.len(), 2);
    assert_eq!(ctx.models.len(), 1);
    assert_eq!(ctx.apis.len(), 1);
    assert_eq!(ctx.models["m1"].training.batch_size, 64);
    assert_eq!(ctx.apis["fraud-api"].compute.replicas, 2);

    let key = gateway.persist(&ctx).unwrap();
    assert!(store.exists(&key).unwrap());

    let fetched = gateway.fetch(ctx.id(), "fraud").unwrap();
    assert_eq!(fetched, ctx);
}

#[test]
fn test_identity_survives_store_reopen() {
    let dir = TempDir::new().unwrap();
    let config = fraud_config();
    let files = fraud_files();

    let first = {
        let store = Arc::new(FilesystemStore::open(dir.path()).unwrap());
        let builder = ContextBuilder::new(KeyNamespace::default(), store.clone()).unwrap();
        let ctx = builder.build(&config, &files, false).unwrap();
        ContextStore::new(store, KeyNamespace::default())
            .persist(&ctx)
            .unwrap();
        ctx
    };

    // A new process sees the same dataset version and therefore the same id
    let store = Arc::new(FilesystemStore::open(dir.path()).unwrap());
    let builder = ContextBuilder::new(KeyNamespace::default(), store.clone()).unwrap();
    let second = builder.build(&config, &files, false).unwrap();

    assert_eq!(first.dataset_version, second.dataset_version);
    assert_eq!(first.id(), second.id());

    let fetched = ContextStore::new(store, KeyNamespace::default())
        .fetch(first.id(), "fraud")
        .unwrap();
    assert_eq!(fetched, second);
}

#[test]
fn test_concurrent_builds_agree() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FilesystemStore::open(dir.path()).unwrap());
    let builder = Arc::new(ContextBuilder::new(KeyNamespace::default(), store).unwrap());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let builder = Arc::clone(&builder);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let config = fraud_config();
                let files = fraud_files();
                barrier.wait();
                builder.build(&config, &files, false).unwrap()
            })
        })
        .collect();

    let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for ctx in &contexts[1..] {
        assert_eq!(ctx.dataset_version, contexts[0].dataset_version);
        assert_eq!(ctx.id(), contexts[0].id());
    }
}

#[test]
fn test_identity_ignores_config_layout() {
    let store = Arc::new(MemoryStore::new());
    let builder = ContextBuilder::new(KeyNamespace::default(), store).unwrap();

    // Same content, different formatting
    let reformatted = FRAUD_APP
        .replace("[[apis]]", "\n\n[[apis]]")
        .replace("min = 0\n", "min = 0.0\n");

    let a = builder.build(&fraud_config(), &fraud_files(), false).unwrap();
    let b = builder
        .build(&AppConfig::from_toml_str(&reformatted).unwrap(), &fraud_files(), false)
        .unwrap();
    assert_eq!(a.id(), b.id());
}

#[test]
fn test_identity_tracks_model_changes_only() {
    let store = Arc::new(MemoryStore::new());
    let builder = ContextBuilder::new(KeyNamespace::default(), store).unwrap();
    let base = builder.build(&fraud_config(), &fraud_files(), false).unwrap();

    let mut files = fraud_files();
    files.insert(
        "implementations/models/m1.py".to_string(),
        b"def create_estimator(run_config, model_config):\n    return 1\n".to_vec(),
    );
    let changed_impl = builder.build(&fraud_config(), &files, false).unwrap();
    assert_ne!(changed_impl.id(), base.id());
    assert_ne!(changed_impl.models["m1"].id, base.models["m1"].id);
    assert_eq!(changed_impl.aggregates, base.aggregates);

    let more_steps = FRAUD_APP.replace(
        "training = { batch_size = 64 }",
        "training = { batch_size = 64, num_steps = 2000 }",
    );
    let changed_training = builder
        .build(&AppConfig::from_toml_str(&more_steps).unwrap(), &fraud_files(), false)
        .unwrap();
    assert_ne!(changed_training.id(), base.id());
    assert_ne!(changed_training.apis["fraud-api"].id, base.apis["fraud-api"].id);

    // Spelling out a default does not change the resolved model
    let explicit_default = FRAUD_APP.replace(
        "training = { batch_size = 64 }",
        "training = { batch_size = 64, num_steps = 1000, shuffle = true }",
    );
    let same = builder
        .build(
            &AppConfig::from_toml_str(&explicit_default).unwrap(),
            &fraud_files(),
            false,
        )
        .unwrap();
    assert_eq!(same.id(), base.id());
}

#[test]
fn test_failed_build_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FilesystemStore::open(dir.path()).unwrap());
    let builder = ContextBuilder::new(KeyNamespace::default(), store.clone()).unwrap();
    let gateway = ContextStore::new(store, KeyNamespace::default());

    let mut files = fraud_files();
    files.remove("implementations/models/m1.py");

    let err = builder.build(&fraud_config(), &files, false).unwrap_err();
    assert_eq!(err.stage(), Some("models"));
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().starts_with("models: "));

    assert!(gateway.list_contexts("fraud").unwrap().is_empty());
}

#[test]
fn test_apps_dir_scopes_every_key() {
    let store = Arc::new(MemoryStore::new());
    let namespace = KeyNamespace::new("tenants/acme");
    let builder = ContextBuilder::new(namespace.clone(), store.clone()).unwrap();
    let gateway = ContextStore::new(store.clone(), namespace);

    let ctx = builder.build(&fraud_config(), &fraud_files(), false).unwrap();
    gateway.persist(&ctx).unwrap();

    assert!(ctx.key().starts_with("tenants/acme/fraud/contexts/"));
    assert!(ctx.root.starts_with("tenants/acme/fraud/data/"));
    assert!(ctx
        .all_resources()
        .iter()
        .filter_map(|r| r.key())
        .all(|key| key.starts_with("tenants/acme/fraud/")));

    // Different apps_dir, different global config, different id
    let default_builder = ContextBuilder::new(KeyNamespace::default(), store).unwrap();
    let other = default_builder
        .build(&fraud_config(), &fraud_files(), false)
        .unwrap();
    assert_ne!(other.id(), ctx.id());
}

#[test]
fn test_non_finite_bounds_are_rejected() {
    for literal in ["nan", "inf", "-inf"] {
        let content = FRAUD_APP.replace("min = 0\n", &format!("min = {}\n", literal));
        let err = AppConfig::from_toml_str(&content).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config, "min = {}", literal);
    }
}

#[test]
fn test_extreme_bounds_keep_distinct_identities() {
    let store = Arc::new(MemoryStore::new());
    let builder = ContextBuilder::new(KeyNamespace::default(), store.clone()).unwrap();
    let gateway = ContextStore::new(store, KeyNamespace::default());

    let contexts: Vec<_> = ["1.7976931348623157e308", "-1.7976931348623157e308", "0"]
        .iter()
        .map(|bound| {
            let content = FRAUD_APP.replace("min = 0\n", &format!("min = {}\n", bound));
            builder
                .build(&AppConfig::from_toml_str(&content).unwrap(), &fraud_files(), false)
                .unwrap()
        })
        .collect();

    assert_ne!(contexts[0].raw_columns["amount"].id, contexts[1].raw_columns["amount"].id);
    assert_ne!(contexts[0].id(), contexts[1].id());
    assert_ne!(contexts[1].id(), contexts[2].id());

    for ctx in &contexts {
        gateway.persist(ctx).unwrap();
        assert_eq!(&gateway.fetch(ctx.id(), "fraud").unwrap(), ctx);
    }
}
