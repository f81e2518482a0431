//! Aggregators and transformers referenced by the graph
//!
//! Merges the built-in catalog with the user definitions. Only functions
//! that an aggregate or transformed column actually uses become resources.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{require, BuildState, USER_PLUGINS};
use crate::catalog::{self, Builtin};
use crate::error::{ContextError, Result};
use crate::hash::digest_value;
use crate::resource::{Function, FunctionSource, ResourceKind, UserPlugin};

#[derive(Serialize)]
struct FunctionIdentity<'a> {
    kind: &'a str,
    name: &'a str,
    source: &'a FunctionSource,
    output_type: &'a str,
    inputs: &'a [String],
}

pub(super) fn run(state: &mut BuildState<'_>) -> Result<()> {
    let config = state.completed_config()?;
    let user_aggregators = require(&state.user_aggregators, USER_PLUGINS)?;
    let user_transformers = require(&state.user_transformers, USER_PLUGINS)?;

    let aggregator_names: BTreeSet<&str> = config
        .aggregates
        .iter()
        .map(|a| a.aggregator.as_str())
        .collect();
    let transformer_names: BTreeSet<&str> = config
        .transformed_columns
        .iter()
        .map(|c| c.transformer.as_str())
        .collect();

    let aggregators = get_functions(
        ResourceKind::Aggregator,
        catalog::AGGREGATORS,
        user_aggregators,
        &aggregator_names,
    )?;
    let transformers = get_functions(
        ResourceKind::Transformer,
        catalog::TRANSFORMERS,
        user_transformers,
        &transformer_names,
    )?;

    state.aggregators = Some(aggregators);
    state.transformers = Some(transformers);
    Ok(())
}

/// Build the function resources for a set of canonical names
pub fn get_functions(
    kind: ResourceKind,
    builtins: &'static [Builtin],
    user: &BTreeMap<String, UserPlugin>,
    names: &BTreeSet<&str>,
) -> Result<BTreeMap<String, Function>> {
    let mut functions = BTreeMap::new();

    for &name in names {
        let (source, output_type, inputs) = match user.get(name) {
            Some(plugin) => (
                FunctionSource::User {
                    user_id: plugin.id.clone(),
                },
                plugin.output_type.clone(),
                plugin.inputs.clone(),
            ),
            None => {
                let builtin = catalog::find(builtins, name)
                    .ok_or_else(|| ContextError::not_found(kind_label(kind), name))?;
                (
                    FunctionSource::Builtin,
                    builtin.output_type.to_string(),
                    builtin.inputs.iter().map(|s| s.to_string()).collect(),
                )
            }
        };

        let id = digest_value(&FunctionIdentity {
            kind: kind.as_str(),
            name,
            source: &source,
            output_type: &output_type,
            inputs: &inputs,
        })?;

        functions.insert(
            name.to_string(),
            Function {
                id,
                name: name.to_string(),
                source,
                output_type,
                inputs,
            },
        );
    }

    Ok(functions)
}

fn kind_label(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Transformer => "transformer",
        _ => "aggregator",
    }
}
