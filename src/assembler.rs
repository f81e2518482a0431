//! Context assembly
//!
//! Drives one build: resolve the dataset version, run the derivation
//! pipeline, validate, then compute the identity. Builds are sequential and
//! fail fast; retrying is left to the caller.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::context::{App, Context, Environment, GlobalConfig, RawDataset};
use crate::error::{ContextError, Result};
use crate::hash::{digest_str, digest_value};
use crate::identity;
use crate::keys::KeyNamespace;
use crate::logging::{operations, status};
use crate::pipeline::{self, BuildState, FileMap};
use crate::storage::VersionStore;
use crate::userconfig::{AppConfig, DataConfig, EnvironmentConfig};
use crate::validate::{StructuralValidator, Validator};
use crate::version::DatasetVersionResolver;

pub const CONFIG_STAGE: &str = "config";
pub const DATASET_VERSION_STAGE: &str = "dataset_version";
pub const ENVIRONMENT_STAGE: &str = "environment";
pub const VALIDATE_STAGE: &str = "validate";

#[derive(Serialize)]
struct GlobalIdentity<'a> {
    apps_dir: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
struct EnvironmentIdentity<'a> {
    name: &'a str,
    data: &'a DataConfig,
    dataset_version: &'a str,
}

impl GlobalConfig {
    pub fn new(namespace: &KeyNamespace) -> Result<Self> {
        let apps_dir = namespace.apps_dir().to_string();
        let version = env!("CARGO_PKG_VERSION").to_string();
        let id = digest_value(&GlobalIdentity {
            apps_dir: &apps_dir,
            version: &version,
        })?;
        Ok(Self {
            id,
            apps_dir,
            version,
        })
    }
}

fn get_environment(config: &EnvironmentConfig, dataset_version: &str) -> Result<Environment> {
    let id = digest_value(&EnvironmentIdentity {
        name: &config.name,
        data: &config.data,
        dataset_version,
    })?;
    Ok(Environment {
        id,
        name: config.name.clone(),
        data: config.data.clone(),
    })
}

/// Builds contexts against an injected version store and validator
pub struct ContextBuilder {
    namespace: KeyNamespace,
    global: GlobalConfig,
    resolver: DatasetVersionResolver,
    validator: Box<dyn Validator>,
}

impl ContextBuilder {
    pub fn new(namespace: KeyNamespace, versions: Arc<dyn VersionStore>) -> Result<Self> {
        Ok(Self {
            global: GlobalConfig::new(&namespace)?,
            namespace,
            resolver: DatasetVersionResolver::new(versions),
            validator: Box::new(StructuralValidator),
        })
    }

    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_resolver(mut self, resolver: DatasetVersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// Resolve `config` into a context with its id and key attached
    ///
    /// `ignore_cache` forces a fresh dataset version. No context is returned
    /// alongside an error.
    pub fn build(&self, config: &AppConfig, files: &FileMap, ignore_cache: bool) -> Result<Context> {
        let started = Instant::now();
        let app_name = config.app.name.as_str();

        let result = self.build_inner(config, files, ignore_cache);

        match &result {
            Ok(ctx) => info!(
                operation = operations::BUILD,
                status = status::SUCCESS,
                app = app_name,
                context_id = %ctx.id(),
                dataset_version = %ctx.dataset_version,
                resource_count = ctx.resource_count(),
                duration_ms = started.elapsed().as_millis() as u64,
                "context built"
            ),
            Err(e) => error!(
                operation = operations::BUILD,
                status = status::ERROR,
                app = app_name,
                stage = e.stage().unwrap_or("unknown"),
                error = %e,
                "context build failed"
            ),
        }

        result
    }

    fn build_inner(&self, config: &AppConfig, files: &FileMap, ignore_cache: bool) -> Result<Context> {
        config.validate().map_err(|e| e.in_stage(CONFIG_STAGE))?;
        let app_name = config.app.name.as_str();

        let app = App {
            id: digest_str(app_name),
            name: app_name.to_string(),
        };

        let dataset_version = self
            .resolver
            .resolve(app_name, ignore_cache)
            .map_err(|e| e.in_stage(DATASET_VERSION_STAGE))?;

        let environment = get_environment(&config.environment, &dataset_version)
            .map_err(|e| e.in_stage(ENVIRONMENT_STAGE))?;
        let root = self
            .namespace
            .root(app_name, &dataset_version, &environment.id);
        let raw_dataset = RawDataset {
            key: self.namespace.raw_dataset_key(&root),
            metadata_key: self.namespace.raw_metadata_key(&root),
        };
        let status_prefix = self.namespace.status_prefix(app_name);

        let mut state = BuildState::new(
            config.clone(),
            files,
            &self.namespace,
            dataset_version,
            environment,
            root,
        );
        pipeline::run(&mut state)?;

        let mut ctx = state.into_context(self.global.clone(), app, raw_dataset, status_prefix)?;

        self.validator.validate(&ctx).map_err(|e| match e {
            ContextError::Validation(_) => e.in_stage(VALIDATE_STAGE),
            other => ContextError::Validation(other.to_string()).in_stage(VALIDATE_STAGE),
        })?;

        identity::assign(&mut ctx, &self.namespace);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::MemoryStore;

    const CONFIG: &str = r#"
[app]
name = "fraud"

[[raw_columns]]
name = "amount"
type = "FLOAT_COLUMN"

[[raw_columns]]
name = "label"
type = "INT_COLUMN"

[[models]]
name = "m1"
type = "classification"
path = "m1.py"
target_column = "label"
feature_columns = ["amount"]
"#;

    fn files() -> FileMap {
        let mut files = FileMap::new();
        files.insert("m1.py".to_string(), b"def create_estimator(): pass".to_vec());
        files
    }

    fn builder() -> ContextBuilder {
        ContextBuilder::new(KeyNamespace::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_build_assigns_identity() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let ctx = builder().build(&config, &files(), false).unwrap();

        assert_eq!(ctx.id().len(), crate::hash::DIGEST_LEN);
        assert_eq!(ctx.key(), format!("apps/fraud/contexts/{}.msgpack", ctx.id()));
        assert!(identity::verify(&ctx));
        assert_eq!(ctx.models.len(), 1);
        assert_eq!(ctx.status_prefix, "apps/fraud/statuses");
        assert!(ctx.raw_dataset.key.ends_with("/raw/raw.parquet"));
        assert!(ctx.root.starts_with(&format!("apps/fraud/data/{}/", ctx.dataset_version)));
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let builder = builder();
        let a = builder.build(&config, &files(), false).unwrap();
        let b = builder.build(&config, &files(), false).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_ignore_cache_changes_identity() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let builder = builder();
        let a = builder.build(&config, &files(), false).unwrap();
        let b = builder.build(&config, &files(), true).unwrap();
        assert_ne!(a.dataset_version, b.dataset_version);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_validator_rejection() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let builder = builder().with_validator(|_: &Context| -> Result<()> {
            Err(ContextError::Validation("no models allowed".to_string()))
        });
        let err = builder.build(&config, &files(), false).unwrap_err();
        assert_eq!(err.stage(), Some(VALIDATE_STAGE));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validator_sees_context_before_identity() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let builder = builder().with_validator(|ctx: &Context| -> Result<()> {
            assert!(ctx.id().is_empty());
            assert!(ctx.key().is_empty());
            Ok(())
        });
        builder.build(&config, &files(), false).unwrap();
    }

    #[test]
    fn test_structural_validator_rejects_shared_names() {
        let config = AppConfig::from_toml_str(&format!(
            "{}\n[[constants]]\nname = \"amount\"\ntype = \"INT\"\nvalue = 1\n",
            CONFIG
        ))
        .unwrap();
        let err = builder().build(&config, &files(), false).unwrap_err();
        assert_eq!(err.stage(), Some(VALIDATE_STAGE));
    }

    #[test]
    fn test_invalid_config_names_its_stage() {
        let mut config = AppConfig::from_toml_str(CONFIG).unwrap();
        config.app.name = "Fraud App".to_string();

        let err = builder().build(&config, &files(), false).unwrap_err();
        assert_eq!(err.stage(), Some(CONFIG_STAGE));
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().starts_with("config: "));
    }
}
