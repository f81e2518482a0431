//! Fill defaults and derived fields into the working config
//!
//! Runs once the user aggregators and transformers are known. Every stage
//! after this one reads the completed config.

use std::collections::{BTreeMap, BTreeSet};

use super::{require, BuildState, USER_PLUGINS};
use crate::catalog::{self, Builtin};
use crate::error::{ContextError, Result};
use crate::resource::UserPlugin;
use crate::userconfig::{AppConfig, ColumnType, ComputeConfig, DataPartitionConfig, TrainingConfig};

pub(super) fn run(state: &mut BuildState<'_>) -> Result<()> {
    let user_aggregators = require(&state.user_aggregators, USER_PLUGINS)?;
    let user_transformers = require(&state.user_transformers, USER_PLUGINS)?;

    autocomplete(&mut state.config, user_aggregators, user_transformers)?;
    state.config_completed = true;
    Ok(())
}

struct Resolved {
    name: String,
    output_type: String,
}

fn resolve(
    what: &'static str,
    catalog: &'static [Builtin],
    user: &BTreeMap<String, UserPlugin>,
    name: &str,
) -> Result<Resolved> {
    let user_names: BTreeSet<String> = user.keys().cloned().collect();
    let canonical = catalog::resolve(catalog, &user_names, name)
        .ok_or_else(|| ContextError::not_found(what, name))?;

    let output_type = match user.get(&canonical) {
        Some(plugin) => plugin.output_type.clone(),
        None => catalog::find(catalog, &canonical)
            .map(|b| b.output_type.to_string())
            .ok_or_else(|| ContextError::not_found(what, name))?,
    };

    Ok(Resolved {
        name: canonical,
        output_type,
    })
}

pub fn autocomplete(
    config: &mut AppConfig,
    user_aggregators: &BTreeMap<String, UserPlugin>,
    user_transformers: &BTreeMap<String, UserPlugin>,
) -> Result<()> {
    for aggregate in &mut config.aggregates {
        let resolved = resolve(
            "aggregator",
            catalog::AGGREGATORS,
            user_aggregators,
            &aggregate.aggregator,
        )?;
        aggregate.aggregator = resolved.name;
        if aggregate.output_type.is_none() {
            aggregate.output_type = Some(resolved.output_type);
        }
    }

    for column in &mut config.transformed_columns {
        let resolved = resolve(
            "transformer",
            catalog::TRANSFORMERS,
            user_transformers,
            &column.transformer,
        )?;
        column.transformer = resolved.name;
        if column.output_type.is_none() {
            let column_type: ColumnType = resolved.output_type.parse()?;
            column.output_type = Some(column_type);
        }
    }

    for model in &mut config.models {
        model.training.get_or_insert_with(TrainingConfig::default);
        model
            .data_partition
            .get_or_insert_with(DataPartitionConfig::default);
    }

    for api in &mut config.apis {
        api.compute.get_or_insert_with(ComputeConfig::default);
    }

    Ok(())
}
