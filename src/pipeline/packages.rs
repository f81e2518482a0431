//! Python packages shipped with the application
//!
//! - `requirements.txt` at the top level becomes the `requirements` package
//! - every `packages/<name>/...` directory becomes package `<name>` and must
//!   contain a `setup.py`

use serde::Serialize;
use std::collections::BTreeMap;

use super::{BuildState, FileMap};
use crate::error::{ContextError, Result};
use crate::hash::{digest, digest_value};
use crate::keys::KeyNamespace;
use crate::resource::PythonPackage;

pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const PACKAGES_DIR: &str = "packages";
const REQUIREMENTS_PACKAGE: &str = "requirements";
const SETUP_FILE: &str = "setup.py";

#[derive(Serialize)]
struct PackageIdentity<'a> {
    name: &'a str,
    files: &'a BTreeMap<String, String>,
}

pub(super) fn run(state: &mut BuildState<'_>) -> Result<()> {
    let packages = load_python_packages(
        state.files,
        state.namespace,
        &state.config.app.name,
        &state.dataset_version,
    )?;
    state.python_packages = Some(packages);
    Ok(())
}

pub fn load_python_packages(
    files: &FileMap,
    namespace: &KeyNamespace,
    app_name: &str,
    dataset_version: &str,
) -> Result<BTreeMap<String, PythonPackage>> {
    // package name -> (path within package -> content digest)
    let mut contents: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for (path, bytes) in files {
        if path == REQUIREMENTS_FILE {
            contents
                .entry(REQUIREMENTS_PACKAGE.to_string())
                .or_default()
                .insert(REQUIREMENTS_FILE.to_string(), digest(bytes));
            continue;
        }

        let Some(rest) = path.strip_prefix(PACKAGES_DIR).and_then(|p| p.strip_prefix('/')) else {
            continue;
        };

        let (name, file) = rest.split_once('/').unwrap_or((rest, ""));
        if name.is_empty() || file.is_empty() {
            return Err(ContextError::config(format!(
                "python package files must live under {}/<name>/: {}",
                PACKAGES_DIR, path
            )));
        }

        if name == REQUIREMENTS_PACKAGE {
            return Err(ContextError::config(format!(
                "python package name '{}' is reserved for {}",
                REQUIREMENTS_PACKAGE, REQUIREMENTS_FILE
            )));
        }

        contents
            .entry(name.to_string())
            .or_default()
            .insert(file.to_string(), digest(bytes));
    }

    let mut packages = BTreeMap::new();
    for (name, files) in contents {
        if name != REQUIREMENTS_PACKAGE && !files.contains_key(SETUP_FILE) {
            return Err(ContextError::Validation(format!(
                "python package {} is missing {}",
                name, SETUP_FILE
            )));
        }

        let id = digest_value(&PackageIdentity {
            name: &name,
            files: &files,
        })?;
        let key = namespace.python_package_key(app_name, dataset_version, &name, &id);

        packages.insert(
            name.clone(),
            PythonPackage {
                id,
                name,
                files,
                key,
            },
        );
    }

    Ok(packages)
}
