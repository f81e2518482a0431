//! Resource derivation pipeline
//!
//! The pipeline is an ordered table of stages. Each stage declares the
//! indices of the earlier stages whose outputs it reads and fills one or more
//! output slots of [`BuildState`]. A stage that reads a slot nobody has filled
//! yet fails, so the declared order is checked at runtime as well as in tests.

mod aggregates;
mod autogen;
mod columns;
mod constants;
mod functions;
mod inputs;
mod models;
mod packages;
mod plugins;

pub use packages::{PACKAGES_DIR, REQUIREMENTS_FILE};

use std::collections::BTreeMap;
use tracing::debug;

use crate::context::{App, Context, Environment, GlobalConfig, RawDataset};
use crate::error::{ContextError, Result};
use crate::keys::KeyNamespace;
use crate::logging::{operations, status};
use crate::resource::{
    Aggregate, Aggregator, Api, Constant, Model, PythonPackage, RawColumn, TransformedColumn,
    Transformer, UserAggregator, UserTransformer,
};
use crate::userconfig::AppConfig;

/// Uploaded files (user code, packages) keyed by relative path
pub type FileMap = BTreeMap<String, Vec<u8>>;

pub type StageFn = fn(&mut BuildState<'_>) -> Result<()>;

pub struct Stage {
    pub name: &'static str,
    /// Indices of the stages whose outputs this stage reads
    pub deps: &'static [usize],
    pub run: StageFn,
}

pub const PYTHON_PACKAGES: &str = "python_packages";
pub const USER_PLUGINS: &str = "user_plugins";
pub const AUTOCOMPLETE_CONFIG: &str = "autocomplete_config";
pub const CONSTANTS: &str = "constants";
pub const AGGREGATORS_TRANSFORMERS: &str = "aggregators_transformers";
pub const RAW_COLUMNS: &str = "raw_columns";
pub const AGGREGATES: &str = "aggregates";
pub const TRANSFORMED_COLUMNS: &str = "transformed_columns";
pub const MODELS: &str = "models";
pub const APIS: &str = "apis";

pub const STAGES: &[Stage] = &[
    Stage {
        name: PYTHON_PACKAGES,
        deps: &[],
        run: packages::run,
    },
    Stage {
        name: USER_PLUGINS,
        deps: &[0],
        run: plugins::run,
    },
    Stage {
        name: AUTOCOMPLETE_CONFIG,
        deps: &[1],
        run: autogen::run,
    },
    Stage {
        name: CONSTANTS,
        deps: &[2],
        run: constants::run,
    },
    Stage {
        name: AGGREGATORS_TRANSFORMERS,
        deps: &[1, 2],
        run: functions::run,
    },
    Stage {
        name: RAW_COLUMNS,
        deps: &[2],
        run: columns::run_raw,
    },
    Stage {
        name: AGGREGATES,
        deps: &[2, 3, 4, 5],
        run: aggregates::run,
    },
    Stage {
        name: TRANSFORMED_COLUMNS,
        deps: &[2, 3, 4, 5, 6],
        run: columns::run_transformed,
    },
    Stage {
        name: MODELS,
        deps: &[0, 2, 5, 6, 7],
        run: models::run_models,
    },
    Stage {
        name: APIS,
        deps: &[2, 8],
        run: models::run_apis,
    },
];

/// Check that every stage depends only on stages that run before it
pub fn check_order(stages: &[Stage]) -> Result<()> {
    for (index, stage) in stages.iter().enumerate() {
        if let Some(dep) = stage.deps.iter().find(|&&dep| dep >= index) {
            return Err(ContextError::config(format!(
                "stage {} ({}) depends on stage {} which does not run before it",
                index, stage.name, dep
            )));
        }
    }
    Ok(())
}

/// Working state threaded through the stages of one build
pub struct BuildState<'a> {
    /// Working copy of the user config; stage 3 fills defaults into it
    pub config: AppConfig,
    pub files: &'a FileMap,
    pub namespace: &'a KeyNamespace,
    pub dataset_version: String,
    pub environment: Environment,
    pub root: String,

    pub completed: Vec<&'static str>,
    pub config_completed: bool,

    pub python_packages: Option<BTreeMap<String, PythonPackage>>,
    pub user_aggregators: Option<BTreeMap<String, UserAggregator>>,
    pub user_transformers: Option<BTreeMap<String, UserTransformer>>,
    pub constants: Option<BTreeMap<String, Constant>>,
    pub aggregators: Option<BTreeMap<String, Aggregator>>,
    pub transformers: Option<BTreeMap<String, Transformer>>,
    pub raw_columns: Option<BTreeMap<String, RawColumn>>,
    pub aggregates: Option<BTreeMap<String, Aggregate>>,
    pub transformed_columns: Option<BTreeMap<String, TransformedColumn>>,
    pub models: Option<BTreeMap<String, Model>>,
    pub apis: Option<BTreeMap<String, Api>>,
}

fn require<'s, T>(slot: &'s Option<T>, name: &'static str) -> Result<&'s T> {
    slot.as_ref()
        .ok_or_else(|| ContextError::not_found("stage output", name))
}

fn take<T>(slot: Option<T>, name: &'static str) -> Result<T> {
    slot.ok_or_else(|| ContextError::not_found("stage output", name))
}

impl<'a> BuildState<'a> {
    pub fn new(
        config: AppConfig,
        files: &'a FileMap,
        namespace: &'a KeyNamespace,
        dataset_version: String,
        environment: Environment,
        root: String,
    ) -> Self {
        Self {
            config,
            files,
            namespace,
            dataset_version,
            environment,
            root,
            completed: Vec::new(),
            config_completed: false,
            python_packages: None,
            user_aggregators: None,
            user_transformers: None,
            constants: None,
            aggregators: None,
            transformers: None,
            raw_columns: None,
            aggregates: None,
            transformed_columns: None,
            models: None,
            apis: None,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.config.app.name
    }

    /// The working config, once defaults have been filled in
    pub fn completed_config(&self) -> Result<&AppConfig> {
        if self.config_completed {
            Ok(&self.config)
        } else {
            Err(ContextError::not_found("stage output", AUTOCOMPLETE_CONFIG))
        }
    }

    /// Assemble the context from the filled slots; id and key stay empty
    pub fn into_context(
        self,
        global: GlobalConfig,
        app: App,
        raw_dataset: RawDataset,
        status_prefix: String,
    ) -> Result<Context> {
        Ok(Context {
            id: String::new(),
            key: String::new(),
            global,
            app,
            environment: self.environment,
            dataset_version: self.dataset_version,
            root: self.root,
            raw_dataset,
            status_prefix,
            python_packages: take(self.python_packages, PYTHON_PACKAGES)?,
            user_aggregators: take(self.user_aggregators, USER_PLUGINS)?,
            user_transformers: take(self.user_transformers, USER_PLUGINS)?,
            constants: take(self.constants, CONSTANTS)?,
            aggregators: take(self.aggregators, AGGREGATORS_TRANSFORMERS)?,
            transformers: take(self.transformers, AGGREGATORS_TRANSFORMERS)?,
            raw_columns: take(self.raw_columns, RAW_COLUMNS)?,
            aggregates: take(self.aggregates, AGGREGATES)?,
            transformed_columns: take(self.transformed_columns, TRANSFORMED_COLUMNS)?,
            models: take(self.models, MODELS)?,
            apis: take(self.apis, APIS)?,
        })
    }
}

/// Run every stage of [`STAGES`] in order, stopping at the first failure
pub fn run(state: &mut BuildState<'_>) -> Result<()> {
    check_order(STAGES)?;
    run_stages(STAGES, state)
}

pub fn run_stages(stages: &[Stage], state: &mut BuildState<'_>) -> Result<()> {
    for stage in stages {
        if let Err(e) = (stage.run)(state) {
            debug!(
                operation = operations::STAGE,
                status = status::ERROR,
                stage = stage.name,
                error = %e,
                "stage failed"
            );
            return Err(e.in_stage(stage.name));
        }

        debug!(
            operation = operations::STAGE,
            status = status::SUCCESS,
            stage = stage.name,
            "stage completed"
        );
        state.completed.push(stage.name);
    }
    Ok(())
}
