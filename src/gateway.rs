//! Context store gateway
//!
//! Moves contexts and status records between memory and an [`ObjectStore`].
//! Contexts are stored as MessagePack under their content key; status
//! records and workload specs are JSON.
//!
//! Decode failures and id mismatches surface as
//! [`ErrorKind::Serialization`](crate::error::ErrorKind::Serialization), which
//! callers treat as "rebuild". Store failures surface as
//! [`ErrorKind::Store`](crate::error::ErrorKind::Store) or `Io`, which callers
//! treat as "retry".

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{ContextError, Result};
use crate::identity;
use crate::keys::{check_id, check_workload_id, KeyNamespace, CONTEXT_EXT};
use crate::logging::{operations, status};
use crate::storage::ObjectStore;

/// Lifecycle state of one workload running a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Pending,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl StatusCode {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatusCode::Succeeded | StatusCode::Failed | StatusCode::Stopped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub app_name: String,
    pub resource_id: String,
    pub workload_id: String,
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResourceStatus {
    pub fn pending(app_name: &str, resource_id: &str, workload_id: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            resource_id: resource_id.to_string(),
            workload_id: workload_id.to_string(),
            code: StatusCode::Pending,
            start: None,
            end: None,
            message: None,
        }
    }
}

/// Which resources of which context one workload computes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub workload_id: String,
    pub app_name: String,
    pub context_id: String,
    pub resource_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct ContextStore {
    store: Arc<dyn ObjectStore>,
    namespace: KeyNamespace,
}

impl ContextStore {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: KeyNamespace) -> Self {
        Self { store, namespace }
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// Write `ctx` under its key and return the key
    pub fn persist(&self, ctx: &Context) -> Result<String> {
        if ctx.id().is_empty() || ctx.key().is_empty() {
            return Err(ContextError::Validation(
                "context has no identity; build it before persisting".to_string(),
            ));
        }

        let started = Instant::now();
        let bytes = rmp_serde::to_vec_named(ctx).map_err(|e| ContextError::Serialization {
            key: ctx.key().to_string(),
            message: e.to_string(),
        })?;
        self.store.put(ctx.key(), &bytes)?;

        info!(
            operation = operations::PERSIST,
            status = status::SUCCESS,
            app = %ctx.app.name,
            context_id = %ctx.id(),
            size_bytes = bytes.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "context persisted"
        );
        Ok(ctx.key().to_string())
    }

    /// Load the context with `context_id` and check it still hashes to that id
    pub fn fetch(&self, context_id: &str, app_name: &str) -> Result<Context> {
        check_id("app name", app_name)?;
        check_id("context id", context_id)?;
        let key = self.namespace.context_key(app_name, context_id);

        let Some(bytes) = self.store.get(&key)? else {
            debug!(
                operation = operations::FETCH,
                status = status::NOT_FOUND,
                app = app_name,
                context_id,
                "context not found"
            );
            return Err(ContextError::not_found("context", key));
        };

        let ctx: Context = rmp_serde::from_slice(&bytes).map_err(|e| {
            ContextError::Serialization {
                key: key.clone(),
                message: e.to_string(),
            }
        })?;

        if ctx.id() != context_id || !identity::verify(&ctx) {
            warn!(
                operation = operations::FETCH,
                status = status::ERROR,
                app = app_name,
                context_id,
                "stored context does not match its id"
            );
            return Err(ContextError::Serialization {
                key,
                message: "content does not hash to the stored id".to_string(),
            });
        }

        debug!(
            operation = operations::FETCH,
            status = status::HIT,
            app = app_name,
            context_id,
            "context fetched"
        );
        Ok(ctx)
    }

    pub fn exists(&self, context_id: &str, app_name: &str) -> Result<bool> {
        check_id("app name", app_name)?;
        check_id("context id", context_id)?;
        self.store
            .exists(&self.namespace.context_key(app_name, context_id))
    }

    /// Ids of every stored context of an application, sorted
    pub fn list_contexts(&self, app_name: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", self.namespace.contexts_prefix(app_name));
        let suffix = format!(".{}", CONTEXT_EXT);

        Ok(self
            .store
            .list_prefix(&prefix)?
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix(&suffix))
                    .filter(|id| !id.contains('/'))
                    .map(str::to_string)
            })
            .collect())
    }

    pub fn write_status(&self, record: &ResourceStatus) -> Result<()> {
        check_status_ids(&record.app_name, &record.resource_id, &record.workload_id)?;
        let key = self.namespace.status_key(
            &record.app_name,
            &record.resource_id,
            &record.workload_id,
        );
        self.put_json(&key, record)?;

        debug!(
            operation = operations::WRITE_STATUS,
            status = status::SUCCESS,
            app = %record.app_name,
            resource_id = %record.resource_id,
            workload_id = %record.workload_id,
            code = ?record.code,
            "status written"
        );
        Ok(())
    }

    pub fn read_status(
        &self,
        app_name: &str,
        resource_id: &str,
        workload_id: &str,
    ) -> Result<Option<ResourceStatus>> {
        check_status_ids(app_name, resource_id, workload_id)?;
        let key = self.namespace.status_key(app_name, resource_id, workload_id);
        let found: Option<ResourceStatus> = self.get_json(&key)?;
        let outcome = if found.is_some() {
            status::HIT
        } else {
            status::MISS
        };

        debug!(
            operation = operations::READ_STATUS,
            status = outcome,
            app = app_name,
            resource_id,
            workload_id,
            "status read"
        );
        Ok(found)
    }

    pub fn set_latest_workload(
        &self,
        app_name: &str,
        resource_id: &str,
        workload_id: &str,
    ) -> Result<()> {
        check_status_ids(app_name, resource_id, workload_id)?;
        let key = self.namespace.latest_workload_key(app_name, resource_id);
        self.put_json(&key, &workload_id)
    }

    pub fn latest_workload(&self, app_name: &str, resource_id: &str) -> Result<Option<String>> {
        check_id("app name", app_name)?;
        check_id("resource id", resource_id)?;
        let key = self.namespace.latest_workload_key(app_name, resource_id);
        self.get_json(&key)
    }

    /// Status of the most recent workload of a resource
    pub fn latest_status(&self, app_name: &str, resource_id: &str) -> Result<Option<ResourceStatus>> {
        match self.latest_workload(app_name, resource_id)? {
            Some(workload_id) => self.read_status(app_name, resource_id, &workload_id),
            None => Ok(None),
        }
    }

    pub fn write_workload_spec(&self, spec: &WorkloadSpec) -> Result<()> {
        check_id("app name", &spec.app_name)?;
        check_workload_id(&spec.workload_id)?;
        let key = self
            .namespace
            .workload_spec_key(&spec.app_name, &spec.workload_id);
        self.put_json(&key, spec)
    }

    pub fn read_workload_spec(&self, app_name: &str, workload_id: &str) -> Result<Option<WorkloadSpec>> {
        check_id("app name", app_name)?;
        check_workload_id(workload_id)?;
        let key = self.namespace.workload_spec_key(app_name, workload_id);
        self.get_json(&key)
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| ContextError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.store.put(key, &bytes)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ContextError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}

fn check_status_ids(app_name: &str, resource_id: &str, workload_id: &str) -> Result<()> {
    check_id("app name", app_name)?;
    check_id("resource id", resource_id)?;
    check_workload_id(workload_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ContextBuilder;
    use crate::error::ErrorKind;
    use crate::pipeline::FileMap;
    use crate::storage::MemoryStore;
    use crate::userconfig::AppConfig;

    const CONFIG: &str = r#"
[app]
name = "fraud"

[[raw_columns]]
name = "amount"
type = "FLOAT_COLUMN"
min = 0

[[raw_columns]]
name = "label"
type = "INT_COLUMN"
values = [0, 1]

[[aggregates]]
name = "amount_mean"
aggregator = "mean"
inputs.columns = { col = "amount" }

[[models]]
name = "m1"
type = "classification"
path = "m1.py"
target_column = "label"
feature_columns = ["amount"]
aggregates = ["amount_mean"]

[[apis]]
name = "fraud-api"
model = "m1"
"#;

    fn setup() -> (Arc<MemoryStore>, ContextStore, Context) {
        let store = Arc::new(MemoryStore::new());
        let builder = ContextBuilder::new(KeyNamespace::default(), store.clone()).unwrap();
        let mut files = FileMap::new();
        files.insert("m1.py".to_string(), b"def create_estimator(): pass".to_vec());
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let ctx = builder.build(&config, &files, false).unwrap();
        let gateway = ContextStore::new(store.clone(), KeyNamespace::default());
        (store, gateway, ctx)
    }

    #[test]
    fn test_persist_then_fetch() {
        let (_, gateway, ctx) = setup();
        let key = gateway.persist(&ctx).unwrap();
        assert_eq!(key, ctx.key());

        let fetched = gateway.fetch(ctx.id(), "fraud").unwrap();
        assert_eq!(fetched, ctx);
        assert!(gateway.exists(ctx.id(), "fraud").unwrap());
        assert_eq!(gateway.list_contexts("fraud").unwrap(), vec![ctx.id().to_string()]);
    }

    #[test]
    fn test_fetch_missing() {
        let (_, gateway, ctx) = setup();
        let err = gateway.fetch(ctx.id(), "fraud").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_fetch_corrupt_blob() {
        let (store, gateway, ctx) = setup();
        store.put(ctx.key(), b"not msgpack").unwrap();
        let err = gateway.fetch(ctx.id(), "fraud").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_fetch_tampered_context() {
        let (store, gateway, mut ctx) = setup();
        ctx.dataset_version = "tampered".to_string();
        store
            .put(ctx.key(), &rmp_serde::to_vec_named(&ctx).unwrap())
            .unwrap();

        let err = gateway.fetch(ctx.id(), "fraud").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_persist_requires_identity() {
        let (_, gateway, mut ctx) = setup();
        ctx.id = String::new();
        let err = gateway.persist(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_status_records() {
        let (_, gateway, ctx) = setup();
        let model_id = ctx.models["m1"].id.clone();

        assert!(gateway.read_status("fraud", &model_id, "w1").unwrap().is_none());
        assert!(gateway.latest_status("fraud", &model_id).unwrap().is_none());

        let mut record = ResourceStatus::pending("fraud", &model_id, "w1");
        gateway.write_status(&record).unwrap();
        gateway.set_latest_workload("fraud", &model_id, "w1").unwrap();

        record.code = StatusCode::Succeeded;
        record.start = Some(Utc::now());
        record.end = Some(Utc::now());
        gateway.write_status(&record).unwrap();

        let latest = gateway.latest_status("fraud", &model_id).unwrap().unwrap();
        assert_eq!(latest, record);
        assert!(latest.code.is_terminal());
        assert_eq!(
            gateway.latest_workload("fraud", &model_id).unwrap().as_deref(),
            Some("w1")
        );
    }

    #[test]
    fn test_workload_spec() {
        let (store, gateway, ctx) = setup();
        let spec = WorkloadSpec {
            workload_id: "w1".to_string(),
            app_name: "fraud".to_string(),
            context_id: ctx.id().to_string(),
            resource_ids: vec![ctx.models["m1"].id.clone()],
            created_at: Utc::now(),
        };
        gateway.write_workload_spec(&spec).unwrap();

        assert!(store.exists("apps/fraud/workload_specs/w1").unwrap());
        assert_eq!(gateway.read_workload_spec("fraud", "w1").unwrap(), Some(spec));
        assert!(gateway.read_workload_spec("fraud", "w2").unwrap().is_none());
    }

    #[test]
    fn test_status_ids_cannot_alias_other_keys() {
        let (store, gateway, ctx) = setup();
        let model_id = ctx.models["m1"].id.clone();

        // Empty workload id would write onto the resource's status directory
        let empty = ResourceStatus::pending("fraud", &model_id, "");
        assert_eq!(gateway.write_status(&empty).unwrap_err().kind(), ErrorKind::Config);

        let pointer = ResourceStatus::pending("fraud", &model_id, "latest");
        assert_eq!(gateway.write_status(&pointer).unwrap_err().kind(), ErrorKind::Config);

        let nested = ResourceStatus::pending("fraud", &model_id, "w1/extra");
        assert!(gateway.write_status(&nested).is_err());

        assert!(gateway.set_latest_workload("fraud", "", "w1").is_err());
        assert!(gateway.set_latest_workload("fraud", &model_id, "").is_err());
        assert!(gateway.latest_workload("fraud", "").is_err());
        assert!(gateway.read_status("fraud", &model_id, "").is_err());
        assert!(gateway.read_workload_spec("fraud", "").is_err());
        assert!(gateway.fetch("", "fraud").is_err());
        assert!(gateway.fetch(ctx.id(), "").is_err());

        let spec = WorkloadSpec {
            workload_id: String::new(),
            app_name: "fraud".to_string(),
            context_id: ctx.id().to_string(),
            resource_ids: vec![model_id],
            created_at: Utc::now(),
        };
        assert!(gateway.write_workload_spec(&spec).is_err());

        assert!(store.list_prefix("apps/fraud/").unwrap().is_empty());
    }
}
