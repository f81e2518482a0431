// Common test utilities shared across integration tests
//
// Every workspace owns two temp directories: one for the app config and the
// uploaded files, one for the store. Nothing is shared between tests, so they
// run in parallel.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use strata::FileMap;

/// Fraud detection app exercising every pipeline stage
pub const FRAUD_APP: &str = r#"
[app]
name = "fraud"

[environment]
name = "dev"
data = { type = "csv", path = "s3://bucket/transactions.csv", schema = ["amount", "merchant", "label"] }

[[raw_columns]]
name = "amount"
type = "FLOAT_COLUMN"
min = 0

[[raw_columns]]
name = "merchant"
type = "STRING_COLUMN"

[[raw_columns]]
name = "label"
type = "INT_COLUMN"
values = [0, 1]

[[constants]]
name = "num_buckets"
type = "INT"
value = 5

[[aggregators]]
name = "p99"
path = "implementations/aggregators/p99.py"
output_type = "FLOAT"
inputs = ["col"]

[[aggregates]]
name = "amount_mean"
aggregator = "mean"
inputs.columns = { col = "amount" }

[[aggregates]]
name = "amount_stddev"
aggregator = "stddev"
inputs.columns = { col = "amount" }

[[aggregates]]
name = "amount_p99"
aggregator = "p99"
inputs.columns = { col = "amount" }

[[aggregates]]
name = "amount_buckets"
aggregator = "bucket_boundaries"
inputs.columns = { col = "amount" }
inputs.args = { num_buckets = "@num_buckets" }

[[aggregates]]
name = "merchant_index"
aggregator = "index_string"
inputs.columns = { col = "merchant" }

[[transformed_columns]]
name = "amount_normalized"
transformer = "normalize"
inputs.columns = { col = "amount" }
inputs.args = { mean = "@amount_mean", stddev = "@amount_stddev" }

[[transformed_columns]]
name = "merchant_indexed"
transformer = "index_string"
inputs.columns = { col = "merchant" }
inputs.args = { index = "@merchant_index" }

[[models]]
name = "m1"
type = "classification"
path = "implementations/models/m1.py"
target_column = "label"
feature_columns = ["amount_normalized", "merchant_indexed"]
aggregates = ["amount_p99"]
training = { batch_size = 64 }

[[apis]]
name = "fraud-api"
model = "m1"
compute = { replicas = 2 }
"#;

/// Uploaded files referenced by [`FRAUD_APP`]
pub const FRAUD_FILES: &[(&str, &str)] = &[
    ("requirements.txt", "numpy==1.26.0\n"),
    (
        "implementations/aggregators/p99.py",
        "def aggregate(data, columns, args):\n    return data.approxQuantile(columns['col'], [0.99], 0.0)[0]\n",
    ),
    (
        "implementations/models/m1.py",
        "def create_estimator(run_config, model_config):\n    return None\n",
    ),
];

pub fn fraud_files() -> FileMap {
    FRAUD_FILES
        .iter()
        .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
        .collect()
}

/// Isolated app directory plus store directory
pub struct TestWorkspace {
    app_dir: TempDir,
    store_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            app_dir: TempDir::new().unwrap(),
            store_dir: TempDir::new().unwrap(),
        }
    }

    /// Workspace holding the fraud app config and its files
    pub fn fraud() -> Self {
        let workspace = Self::new();
        workspace.create_file("app.toml", FRAUD_APP);
        for (path, content) in FRAUD_FILES {
            workspace.create_file(path, content);
        }
        workspace
    }

    pub fn path(&self) -> &Path {
        self.app_dir.path()
    }

    pub fn store_path(&self) -> &Path {
        self.store_dir.path()
    }

    pub fn app_config(&self) -> PathBuf {
        self.path().join("app.toml")
    }

    pub fn create_file(&self, path: &str, content: &str) {
        let file_path = self.path().join(path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        fs::write(file_path, content).unwrap();
    }

    /// `strata` binary bound to this workspace's store
    pub fn strata(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_strata"));
        cmd.current_dir(self.path())
            .env("STRATA_STORE_DIR", self.store_path())
            .env("STRATA_LOG_FORMAT", "compact")
            .env_remove("STRATA_CONFIG")
            .env_remove("STRATA_APPS_DIR")
            .env_remove("RUST_LOG");
        cmd
    }
}
