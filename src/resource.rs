//! Resources derived from an application configuration
//!
//! Every resource carries an `id` that is a digest of its own resolved
//! configuration. Ids of referenced resources are part of that configuration,
//! sibling resources are not.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::userconfig::{
    ColumnType, ComputeConfig, DataPartitionConfig, ModelType, TrainingConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    PythonPackage,
    Constant,
    UserAggregator,
    UserTransformer,
    Aggregator,
    Transformer,
    RawColumn,
    Aggregate,
    TransformedColumn,
    Model,
    Api,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            ResourceKind::PythonPackage => "python_package",
            ResourceKind::Constant => "constant",
            ResourceKind::UserAggregator => "user_aggregator",
            ResourceKind::UserTransformer => "user_transformer",
            ResourceKind::Aggregator => "aggregator",
            ResourceKind::Transformer => "transformer",
            ResourceKind::RawColumn => "raw_column",
            ResourceKind::Aggregate => "aggregate",
            ResourceKind::TransformedColumn => "transformed_column",
            ResourceKind::Model => "model",
            ResourceKind::Api => "api",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and id of a resource referenced by another resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub name: String,
    pub id: String,
}

/// Resolved value of an aggregate or transformer argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    Literal(Value),
    Constant(ResourceRef),
    Aggregate(ResourceRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResolvedInputs {
    pub columns: BTreeMap<String, Vec<ResourceRef>>,
    pub args: BTreeMap<String, ArgValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PythonPackage {
    pub id: String,
    pub name: String,
    /// Relative file path -> content digest
    pub files: BTreeMap<String, String>,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub id: String,
    pub name: String,
    pub value_type: String,
    pub value: Value,
}

/// User-supplied aggregator or transformer implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPlugin {
    pub id: String,
    pub name: String,
    pub path: String,
    pub impl_id: String,
    pub impl_key: String,
    pub output_type: String,
    pub inputs: Vec<String>,
    /// Ids of the python packages available to the implementation
    pub python_packages: Vec<String>,
}

pub type UserAggregator = UserPlugin;
pub type UserTransformer = UserPlugin;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionSource {
    Builtin,
    User { user_id: String },
}

/// Aggregator or transformer as referenced by the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub id: String,
    pub name: String,
    pub source: FunctionSource,
    pub output_type: String,
    pub inputs: Vec<String>,
}

pub type Aggregator = Function;
pub type Transformer = Function;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub id: String,
    pub name: String,
    pub column_type: ColumnType,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub values: Option<Vec<Value>>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: String,
    pub name: String,
    pub aggregator: ResourceRef,
    pub inputs: ResolvedInputs,
    pub output_type: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedColumn {
    pub id: String,
    pub name: String,
    pub transformer: ResourceRef,
    pub inputs: ResolvedInputs,
    pub column_type: ColumnType,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub model_type: ModelType,
    pub path: String,
    pub impl_id: String,
    pub target_column: ResourceRef,
    pub feature_columns: Vec<ResourceRef>,
    pub aggregates: Vec<ResourceRef>,
    pub training: TrainingConfig,
    pub data_partition: DataPartitionConfig,
    pub python_packages: Vec<String>,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub id: String,
    pub name: String,
    pub model: ResourceRef,
    pub compute: ComputeConfig,
}

/// Borrowed view over any resource in a context
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    PythonPackage(&'a PythonPackage),
    Constant(&'a Constant),
    UserAggregator(&'a UserAggregator),
    UserTransformer(&'a UserTransformer),
    Aggregator(&'a Aggregator),
    Transformer(&'a Transformer),
    RawColumn(&'a RawColumn),
    Aggregate(&'a Aggregate),
    TransformedColumn(&'a TransformedColumn),
    Model(&'a Model),
    Api(&'a Api),
}

impl<'a> Resource<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            Resource::PythonPackage(r) => &r.id,
            Resource::Constant(r) => &r.id,
            Resource::UserAggregator(r) => &r.id,
            Resource::UserTransformer(r) => &r.id,
            Resource::Aggregator(r) => &r.id,
            Resource::Transformer(r) => &r.id,
            Resource::RawColumn(r) => &r.id,
            Resource::Aggregate(r) => &r.id,
            Resource::TransformedColumn(r) => &r.id,
            Resource::Model(r) => &r.id,
            Resource::Api(r) => &r.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match *self {
            Resource::PythonPackage(r) => &r.name,
            Resource::Constant(r) => &r.name,
            Resource::UserAggregator(r) => &r.name,
            Resource::UserTransformer(r) => &r.name,
            Resource::Aggregator(r) => &r.name,
            Resource::Transformer(r) => &r.name,
            Resource::RawColumn(r) => &r.name,
            Resource::Aggregate(r) => &r.name,
            Resource::TransformedColumn(r) => &r.name,
            Resource::Model(r) => &r.name,
            Resource::Api(r) => &r.name,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match *self {
            Resource::PythonPackage(_) => ResourceKind::PythonPackage,
            Resource::Constant(_) => ResourceKind::Constant,
            Resource::UserAggregator(_) => ResourceKind::UserAggregator,
            Resource::UserTransformer(_) => ResourceKind::UserTransformer,
            Resource::Aggregator(_) => ResourceKind::Aggregator,
            Resource::Transformer(_) => ResourceKind::Transformer,
            Resource::RawColumn(_) => ResourceKind::RawColumn,
            Resource::Aggregate(_) => ResourceKind::Aggregate,
            Resource::TransformedColumn(_) => ResourceKind::TransformedColumn,
            Resource::Model(_) => ResourceKind::Model,
            Resource::Api(_) => ResourceKind::Api,
        }
    }

    /// Storage key of the artifact this resource materializes, if any
    pub fn key(&self) -> Option<&'a str> {
        match *self {
            Resource::PythonPackage(r) => Some(&r.key),
            Resource::UserAggregator(r) | Resource::UserTransformer(r) => Some(&r.impl_key),
            Resource::Aggregate(r) => Some(&r.key),
            Resource::TransformedColumn(r) => Some(&r.key),
            Resource::Model(r) => Some(&r.key),
            Resource::Constant(_)
            | Resource::Aggregator(_)
            | Resource::Transformer(_)
            | Resource::RawColumn(_)
            | Resource::Api(_) => None,
        }
    }
}

/// A column that can feed an aggregate, transformer or model
#[derive(Debug, Clone, Copy)]
pub enum Column<'a> {
    Raw(&'a RawColumn),
    Transformed(&'a TransformedColumn),
}

impl<'a> Column<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            Column::Raw(c) => &c.id,
            Column::Transformed(c) => &c.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match *self {
            Column::Raw(c) => &c.name,
            Column::Transformed(c) => &c.name,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match *self {
            Column::Raw(c) => c.column_type,
            Column::Transformed(c) => c.column_type,
        }
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            name: self.name().to_string(),
            id: self.id().to_string(),
        }
    }
}
