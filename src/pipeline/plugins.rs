//! User-defined aggregators and transformers

use serde::Serialize;
use std::collections::BTreeMap;

use super::{require, BuildState, FileMap, PYTHON_PACKAGES};
use crate::error::{ContextError, Result};
use crate::hash::{digest, digest_value};
use crate::keys::KeyNamespace;
use crate::resource::{PythonPackage, ResourceKind, UserPlugin};
use crate::userconfig::{ColumnType, PluginConfig};

#[derive(Serialize)]
struct PluginIdentity<'a> {
    kind: &'a str,
    name: &'a str,
    impl_id: &'a str,
    output_type: &'a str,
    inputs: &'a [String],
    python_packages: &'a [String],
}

pub(super) fn run(state: &mut BuildState<'_>) -> Result<()> {
    let packages = require(&state.python_packages, PYTHON_PACKAGES)?;
    let app_name = &state.config.app.name;

    let transformers = load_user_plugins(
        ResourceKind::UserTransformer,
        &state.config.transformers,
        state.files,
        packages,
        state.namespace,
        app_name,
    )?;

    for transformer in transformers.values() {
        transformer.output_type.parse::<ColumnType>().map_err(|e| {
            ContextError::config(format!("transformer {}: {}", transformer.name, e))
        })?;
    }

    let aggregators = load_user_plugins(
        ResourceKind::UserAggregator,
        &state.config.aggregators,
        state.files,
        packages,
        state.namespace,
        app_name,
    )?;

    state.user_transformers = Some(transformers);
    state.user_aggregators = Some(aggregators);
    Ok(())
}

pub fn load_user_plugins(
    kind: ResourceKind,
    configs: &[PluginConfig],
    files: &FileMap,
    packages: &BTreeMap<String, PythonPackage>,
    namespace: &KeyNamespace,
    app_name: &str,
) -> Result<BTreeMap<String, UserPlugin>> {
    let mut package_ids: Vec<String> = packages.values().map(|p| p.id.clone()).collect();
    package_ids.sort();

    let mut plugins = BTreeMap::new();
    for config in configs {
        if config.name.is_empty() || config.name.contains('.') {
            return Err(ContextError::config(format!(
                "{} name must be non-empty and must not contain '.': {:?}",
                kind, config.name
            )));
        }

        if plugins.contains_key(&config.name) {
            return Err(ContextError::config(format!(
                "duplicate {} name: {}",
                kind, config.name
            )));
        }

        let bytes = files.get(&config.path).ok_or_else(|| {
            ContextError::io(
                &config.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file not in upload"),
            )
        })?;

        let impl_id = digest(bytes);
        let id = digest_value(&PluginIdentity {
            kind: kind.as_str(),
            name: &config.name,
            impl_id: &impl_id,
            output_type: &config.output_type,
            inputs: &config.inputs,
            python_packages: &package_ids,
        })?;
        let impl_key = namespace.implementation_key(app_name, kind.as_str(), &impl_id);

        plugins.insert(
            config.name.clone(),
            UserPlugin {
                id,
                name: config.name.clone(),
                path: config.path.clone(),
                impl_id,
                impl_key,
                output_type: config.output_type.clone(),
                inputs: config.inputs.clone(),
                python_packages: package_ids.clone(),
            },
        );
    }

    Ok(plugins)
}
