//! Models and the APIs that serve them

use serde::Serialize;
use std::collections::BTreeMap;

use super::{
    require, BuildState, FileMap, AGGREGATES, MODELS, PYTHON_PACKAGES, RAW_COLUMNS,
    TRANSFORMED_COLUMNS,
};
use crate::context::columns_of;
use crate::error::{ContextError, Result};
use crate::hash::{digest, digest_value};
use crate::keys::model_key;
use crate::resource::{Aggregate, Api, Column, Model, PythonPackage, ResourceRef};
use crate::userconfig::{
    AppConfig, ColumnType, ComputeConfig, DataPartitionConfig, ModelConfig, ModelType,
    TrainingConfig,
};

#[derive(Serialize)]
struct ModelIdentity<'a> {
    name: &'a str,
    model_type: ModelType,
    impl_id: &'a str,
    target_column: &'a ResourceRef,
    feature_columns: &'a [ResourceRef],
    aggregates: &'a [ResourceRef],
    training: &'a TrainingConfig,
    data_partition: &'a DataPartitionConfig,
    python_packages: &'a [String],
}

#[derive(Serialize)]
struct ApiIdentity<'a> {
    name: &'a str,
    model_id: &'a str,
    compute: &'a ComputeConfig,
}

pub(super) fn run_models(state: &mut BuildState<'_>) -> Result<()> {
    let raw_columns = require(&state.raw_columns, RAW_COLUMNS)?;
    let transformed_columns = require(&state.transformed_columns, TRANSFORMED_COLUMNS)?;
    let columns = columns_of(raw_columns, transformed_columns);

    let models = get_models(
        state.completed_config()?,
        require(&state.aggregates, AGGREGATES)?,
        &columns,
        state.files,
        &state.root,
        require(&state.python_packages, PYTHON_PACKAGES)?,
    )?;
    state.models = Some(models);
    Ok(())
}

fn column_ref(columns: &BTreeMap<&str, Column<'_>>, name: &str) -> Result<ResourceRef> {
    columns
        .get(name)
        .map(Column::to_ref)
        .ok_or_else(|| ContextError::not_found("column", name))
}

fn check_target(model: &ModelConfig, columns: &BTreeMap<&str, Column<'_>>) -> Result<()> {
    let Some(target) = columns.get(model.target_column.as_str()) else {
        return Ok(());
    };

    let valid = match model.model_type {
        ModelType::Classification => target.column_type() == ColumnType::Int,
        ModelType::Regression => target.column_type() != ColumnType::String,
    };

    if !valid {
        return Err(ContextError::Validation(format!(
            "model {}: target column {} has type {}, which a {:?} model cannot predict",
            model.name,
            model.target_column,
            target.column_type(),
            model.model_type
        )));
    }

    Ok(())
}

pub fn get_models(
    config: &AppConfig,
    aggregates: &BTreeMap<String, Aggregate>,
    columns: &BTreeMap<&str, Column<'_>>,
    files: &FileMap,
    root: &str,
    python_packages: &BTreeMap<String, PythonPackage>,
) -> Result<BTreeMap<String, Model>> {
    let mut package_ids: Vec<String> = python_packages.values().map(|p| p.id.clone()).collect();
    package_ids.sort();

    let mut models = BTreeMap::new();
    for model in &config.models {
        if models.contains_key(&model.name) {
            return Err(ContextError::config(format!(
                "duplicate model name: {}",
                model.name
            )));
        }

        let bytes = files.get(&model.path).ok_or_else(|| {
            ContextError::io(
                &model.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file not in upload"),
            )
        })?;
        let impl_id = digest(bytes);

        let target_column = column_ref(columns, &model.target_column)?;
        check_target(model, columns)?;

        if model.feature_columns.contains(&model.target_column) {
            return Err(ContextError::Validation(format!(
                "model {}: target column {} is also a feature column",
                model.name, model.target_column
            )));
        }

        let feature_columns = model
            .feature_columns
            .iter()
            .map(|name| column_ref(columns, name))
            .collect::<Result<Vec<_>>>()?;

        let model_aggregates = model
            .aggregates
            .iter()
            .map(|name| {
                aggregates
                    .get(name)
                    .map(|a| ResourceRef {
                        name: a.name.clone(),
                        id: a.id.clone(),
                    })
                    .ok_or_else(|| ContextError::not_found("aggregate", name))
            })
            .collect::<Result<Vec<_>>>()?;

        let training = model.training.clone().unwrap_or_default();
        let data_partition = model.data_partition.clone().unwrap_or_default();
        let positive = |ratio: f64| ratio.is_finite() && ratio > 0.0;
        if !positive(data_partition.training) || !positive(data_partition.evaluation) {
            return Err(ContextError::Validation(format!(
                "model {}: data partition ratios must be positive finite numbers",
                model.name
            )));
        }

        let id = digest_value(&ModelIdentity {
            name: &model.name,
            model_type: model.model_type,
            impl_id: &impl_id,
            target_column: &target_column,
            feature_columns: &feature_columns,
            aggregates: &model_aggregates,
            training: &training,
            data_partition: &data_partition,
            python_packages: &package_ids,
        })?;
        let key = model_key(root, &id);

        models.insert(
            model.name.clone(),
            Model {
                id,
                name: model.name.clone(),
                model_type: model.model_type,
                path: model.path.clone(),
                impl_id,
                target_column,
                feature_columns,
                aggregates: model_aggregates,
                training,
                data_partition,
                python_packages: package_ids.clone(),
                key,
            },
        );
    }

    Ok(models)
}

pub(super) fn run_apis(state: &mut BuildState<'_>) -> Result<()> {
    let apis = get_apis(state.completed_config()?, require(&state.models, MODELS)?)?;
    state.apis = Some(apis);
    Ok(())
}

pub fn get_apis(
    config: &AppConfig,
    models: &BTreeMap<String, Model>,
) -> Result<BTreeMap<String, Api>> {
    let mut apis = BTreeMap::new();

    for api in &config.apis {
        if apis.contains_key(&api.name) {
            return Err(ContextError::config(format!(
                "duplicate api name: {}",
                api.name
            )));
        }

        let model = models
            .get(&api.model)
            .ok_or_else(|| ContextError::not_found("model", &api.model))?;

        let compute = api.compute.clone().unwrap_or_default();
        if compute.replicas == 0 {
            return Err(ContextError::Validation(format!(
                "api {}: compute.replicas must be at least 1",
                api.name
            )));
        }

        let id = digest_value(&ApiIdentity {
            name: &api.name,
            model_id: &model.id,
            compute: &compute,
        })?;

        apis.insert(
            api.name.clone(),
            Api {
                id,
                name: api.name.clone(),
                model: ResourceRef {
                    name: model.name.clone(),
                    id: model.id.clone(),
                },
                compute,
            },
        );
    }

    Ok(apis)
}
