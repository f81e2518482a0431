//! Storage key namespace
//!
//! Every key lives under `<apps>/<app_name>/`. Keys are never stored, they
//! are recomputed from their inputs at the point of use.
//!
//! ```text
//! <apps>/<app>/data/<dataset_version>/<environment_id>/raw/raw.parquet
//! <apps>/<app>/contexts/<context_id>.msgpack
//! <apps>/<app>/statuses/<resource_id>/<workload_id>
//! <apps>/<app>/statuses/<resource_id>/latest
//! <apps>/<app>/workload_specs/<workload_id>
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, Result};

pub const DEFAULT_APPS_DIR: &str = "apps";
pub const DATA_DIR: &str = "data";
pub const RAW_DATA_DIR: &str = "raw";
pub const CONTEXTS_DIR: &str = "contexts";
pub const STATUSES_DIR: &str = "statuses";
pub const WORKLOAD_SPECS_DIR: &str = "workload_specs";
pub const PYTHON_PACKAGES_DIR: &str = "python_packages";
pub const IMPLEMENTATIONS_DIR: &str = "implementations";
pub const AGGREGATES_DIR: &str = "aggregates";
pub const TRANSFORMED_COLUMNS_DIR: &str = "transformed_columns";
pub const MODELS_DIR: &str = "models";
pub const LATEST: &str = "latest";

/// Extension of serialized context blobs
pub const CONTEXT_EXT: &str = "msgpack";

/// Join key segments with `/`, skipping empty segments
pub fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.trim_matches('/'))
        .collect::<Vec<_>>()
        .join("/")
}

/// Check that an id can stand as a single key segment
///
/// Empty ids would collapse the key onto its parent prefix and ids with `/`
/// or dot segments would land in another namespace.
pub fn check_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ContextError::config(format!("{} must not be empty", what)));
    }
    if id.contains('/') || id == "." || id == ".." {
        return Err(ContextError::config(format!(
            "{} must be a single path segment: {:?}",
            what, id
        )));
    }
    Ok(())
}

/// Like [`check_id`], also rejecting the name of the latest-workload pointer
pub fn check_workload_id(id: &str) -> Result<()> {
    check_id("workload id", id)?;
    if id == LATEST {
        return Err(ContextError::config(format!(
            "workload id {:?} is reserved",
            LATEST
        )));
    }
    Ok(())
}

/// Builder for all keys in the store, rooted at a configurable apps prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyNamespace {
    apps_dir: String,
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self::new(DEFAULT_APPS_DIR)
    }
}

impl KeyNamespace {
    pub fn new(apps_dir: impl Into<String>) -> Self {
        Self {
            apps_dir: apps_dir.into(),
        }
    }

    pub fn apps_dir(&self) -> &str {
        &self.apps_dir
    }

    pub fn app_prefix(&self, app_name: &str) -> String {
        join(&[&self.apps_dir, app_name])
    }

    /// `<apps>/<app>/data/<dataset_version>/<environment_id>`
    pub fn root(&self, app_name: &str, dataset_version: &str, environment_id: &str) -> String {
        join(&[
            &self.apps_dir,
            app_name,
            DATA_DIR,
            dataset_version,
            environment_id,
        ])
    }

    pub fn raw_dataset_key(&self, root: &str) -> String {
        join(&[root, RAW_DATA_DIR, "raw.parquet"])
    }

    pub fn raw_metadata_key(&self, root: &str) -> String {
        join(&[root, RAW_DATA_DIR, "metadata.json"])
    }

    pub fn context_key(&self, app_name: &str, context_id: &str) -> String {
        let file = format!("{}.{}", context_id, CONTEXT_EXT);
        join(&[&self.apps_dir, app_name, CONTEXTS_DIR, &file])
    }

    /// Prefix under which every context blob of an app lives
    pub fn contexts_prefix(&self, app_name: &str) -> String {
        join(&[&self.apps_dir, app_name, CONTEXTS_DIR])
    }

    pub fn status_prefix(&self, app_name: &str) -> String {
        join(&[&self.apps_dir, app_name, STATUSES_DIR])
    }

    pub fn status_key(&self, app_name: &str, resource_id: &str, workload_id: &str) -> String {
        join(&[&self.status_prefix(app_name), resource_id, workload_id])
    }

    pub fn latest_workload_key(&self, app_name: &str, resource_id: &str) -> String {
        join(&[&self.status_prefix(app_name), resource_id, LATEST])
    }

    pub fn workload_spec_key(&self, app_name: &str, workload_id: &str) -> String {
        join(&[&self.apps_dir, app_name, WORKLOAD_SPECS_DIR, workload_id])
    }

    pub fn python_package_key(
        &self,
        app_name: &str,
        dataset_version: &str,
        package_name: &str,
        package_id: &str,
    ) -> String {
        let file = format!("{}.zip", package_id);
        join(&[
            &self.apps_dir,
            app_name,
            PYTHON_PACKAGES_DIR,
            dataset_version,
            package_name,
            &file,
        ])
    }

    pub fn implementation_key(&self, app_name: &str, kind: &str, impl_id: &str) -> String {
        let file = format!("{}.py", impl_id);
        join(&[&self.apps_dir, app_name, IMPLEMENTATIONS_DIR, kind, &file])
    }
}

pub fn aggregate_key(root: &str, aggregate_id: &str) -> String {
    let file = format!("{}.msgpack", aggregate_id);
    join(&[root, AGGREGATES_DIR, &file])
}

pub fn transformed_column_key(root: &str, column_id: &str) -> String {
    join(&[root, TRANSFORMED_COLUMNS_DIR, column_id])
}

pub fn model_key(root: &str, model_id: &str) -> String {
    let file = format!("{}.zip", model_id);
    join(&[root, MODELS_DIR, &file])
}
