//! The resolved, content-addressed execution graph of one application
//!
//! A `Context` is produced by [`crate::assembler::ContextBuilder::build`] and
//! is never updated in place. Its `id` and `key` are assigned once by the
//! identity calculator and can only be read afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resource::{
    Aggregate, Aggregator, Api, Column, Constant, Model, PythonPackage, RawColumn, Resource,
    TransformedColumn, Transformer, UserAggregator, UserTransformer,
};
use crate::userconfig::DataConfig;

/// Settings of the resolving service that affect every context it builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub id: String,
    pub apps_dir: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub data: DataConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDataset {
    pub key: String,
    pub metadata_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub(crate) id: String,
    pub(crate) key: String,

    pub global: GlobalConfig,
    pub app: App,
    pub environment: Environment,
    pub dataset_version: String,
    pub root: String,
    pub raw_dataset: RawDataset,
    pub status_prefix: String,

    pub python_packages: BTreeMap<String, PythonPackage>,
    pub user_aggregators: BTreeMap<String, UserAggregator>,
    pub user_transformers: BTreeMap<String, UserTransformer>,
    pub constants: BTreeMap<String, Constant>,
    pub aggregators: BTreeMap<String, Aggregator>,
    pub transformers: BTreeMap<String, Transformer>,
    pub raw_columns: BTreeMap<String, RawColumn>,
    pub aggregates: BTreeMap<String, Aggregate>,
    pub transformed_columns: BTreeMap<String, TransformedColumn>,
    pub models: BTreeMap<String, Model>,
    pub apis: BTreeMap<String, Api>,
}

impl Context {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Storage key of the serialized context
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every resource in every set, grouped by kind in pipeline order
    pub fn all_resources(&self) -> Vec<Resource<'_>> {
        let mut resources = Vec::with_capacity(self.resource_count());
        resources.extend(self.python_packages.values().map(Resource::PythonPackage));
        resources.extend(self.user_aggregators.values().map(Resource::UserAggregator));
        resources.extend(self.user_transformers.values().map(Resource::UserTransformer));
        resources.extend(self.constants.values().map(Resource::Constant));
        resources.extend(self.aggregators.values().map(Resource::Aggregator));
        resources.extend(self.transformers.values().map(Resource::Transformer));
        resources.extend(self.raw_columns.values().map(Resource::RawColumn));
        resources.extend(self.aggregates.values().map(Resource::Aggregate));
        resources.extend(
            self.transformed_columns
                .values()
                .map(Resource::TransformedColumn),
        );
        resources.extend(self.models.values().map(Resource::Model));
        resources.extend(self.apis.values().map(Resource::Api));
        resources
    }

    pub fn resource_count(&self) -> usize {
        self.python_packages.len()
            + self.user_aggregators.len()
            + self.user_transformers.len()
            + self.constants.len()
            + self.aggregators.len()
            + self.transformers.len()
            + self.raw_columns.len()
            + self.aggregates.len()
            + self.transformed_columns.len()
            + self.models.len()
            + self.apis.len()
    }

    pub fn resource_by_id(&self, id: &str) -> Option<Resource<'_>> {
        self.all_resources().into_iter().find(|r| r.id() == id)
    }

    /// Raw and transformed columns by name
    pub fn columns(&self) -> BTreeMap<&str, Column<'_>> {
        columns_of(&self.raw_columns, &self.transformed_columns)
    }
}

pub(crate) fn columns_of<'a>(
    raw: &'a BTreeMap<String, RawColumn>,
    transformed: &'a BTreeMap<String, TransformedColumn>,
) -> BTreeMap<&'a str, Column<'a>> {
    raw.iter()
        .map(|(name, c)| (name.as_str(), Column::Raw(c)))
        .chain(
            transformed
                .iter()
                .map(|(name, c)| (name.as_str(), Column::Transformed(c))),
        )
        .collect()
}
