use crate::error::{CliError, Result};
use cathnet::data::split::SplitSize;
use cathnet::engine::config::Accelerator;
use cathnet::model::config::{Activation, RbfKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileDatasetConfig {
    pub root: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub domains: Option<Vec<String>>,
    pub temperatures: Option<Vec<u32>>,
    pub frame_stride: Option<usize>,
    pub max_atoms: Option<usize>,
    pub max_residues: Option<usize>,
    pub min_gyration_radius: Option<f32>,
    pub max_gyration_radius: Option<f32>,
    pub max_alpha: Option<f32>,
    pub max_beta: Option<f32>,
    pub max_coil: Option<f32>,
    pub train_size: Option<SplitSize>,
    pub val_size: Option<SplitSize>,
    pub test_size: Option<SplitSize>,
    pub splits_file: Option<PathBuf>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileModelConfig {
    pub embedding_dimension: Option<usize>,
    pub num_layers: Option<usize>,
    pub num_rbf: Option<usize>,
    pub rbf_type: Option<RbfKind>,
    pub activation: Option<Activation>,
    pub cutoff_lower: Option<f64>,
    pub cutoff_upper: Option<f64>,
    pub max_z: Option<usize>,
    pub max_num_neighbors: Option<usize>,
    pub derivative: Option<bool>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileTrainingConfig {
    pub batch_size: Option<usize>,
    pub inference_batch_size: Option<usize>,
    pub lr: Option<f64>,
    pub weight_decay: Option<f64>,
    pub lr_warmup_steps: Option<usize>,
    pub lr_factor: Option<f64>,
    pub lr_patience: Option<usize>,
    pub lr_min: Option<f64>,
    pub gradient_clipping: Option<f64>,
    pub num_epochs: Option<usize>,
    pub y_weight: Option<f64>,
    pub neg_dy_weight: Option<f64>,
    pub log_dir: Option<PathBuf>,
    pub save_interval: Option<usize>,
    pub save_top_k: Option<usize>,
    pub num_workers: Option<usize>,
    pub precision: Option<u32>,
    pub accelerator: Option<Accelerator>,
    pub devices: Option<Vec<usize>>,
    pub load_model: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// A run configuration file: every key is optional and unknown keys are rejected.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub dataset: Option<FileDatasetConfig>,
    pub model: Option<FileModelConfig>,
    pub training: Option<FileTrainingConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
