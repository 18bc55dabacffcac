use crate::data::split::SplitSize;
use crate::model::config::PotentialConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },

    #[error("Conflicting parameters: {0}")]
    Conflict(String),

    #[error("Failed to create log directory {path:?}: {message}")]
    LogDirectory { path: PathBuf, message: String },

    #[error("Failed to read run configuration {path:?}: {message}")]
    Load { path: PathBuf, message: String },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

/// Numeric precision of the model and its training arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Precision {
    Single,
    Double,
}

impl TryFrom<u32> for Precision {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            32 => Ok(Precision::Single),
            64 => Ok(Precision::Double),
            other => Err(format!("precision must be 32 or 64, got {other}")),
        }
    }
}

impl From<Precision> for u32 {
    fn from(precision: Precision) -> Self {
        match precision {
            Precision::Single => 32,
            Precision::Double => 64,
        }
    }
}

/// Where model computation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    Cpu,
    Gpu,
}

impl FromStr for Accelerator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Accelerator::Cpu),
            "gpu" | "cuda" => Ok(Accelerator::Gpu),
            other => Err(format!("unknown accelerator '{other}' (expected 'cpu' or 'gpu')")),
        }
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accelerator::Cpu => write!(f, "cpu"),
            Accelerator::Gpu => write!(f, "gpu"),
        }
    }
}

/// Optional domain- and replica-level filters; `None` disables a filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatasetFilters {
    pub max_atoms: Option<usize>,
    pub max_residues: Option<usize>,
    pub min_gyration_radius: Option<f32>,
    pub max_gyration_radius: Option<f32>,
    pub max_alpha: Option<f32>,
    pub max_beta: Option<f32>,
    pub max_coil: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatasetConfig {
    pub root: PathBuf,
    pub remote_url: Option<String>,
    pub domains: Vec<String>,
    pub temperatures: Vec<u32>,
    pub frame_stride: usize,
    pub filters: DatasetFilters,
    pub train_size: SplitSize,
    pub val_size: SplitSize,
    pub test_size: SplitSize,
    pub splits_file: Option<PathBuf>,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub inference_batch_size: usize,
    pub lr: f64,
    pub weight_decay: f64,
    pub lr_warmup_steps: usize,
    pub lr_factor: f64,
    pub lr_patience: usize,
    pub lr_min: f64,
    pub gradient_clipping: Option<f64>,
    pub num_epochs: usize,
    pub y_weight: f64,
    pub neg_dy_weight: f64,
    pub log_dir: PathBuf,
    pub save_interval: usize,
    pub save_top_k: usize,
    pub num_workers: usize,
    pub precision: Precision,
    pub accelerator: Accelerator,
    pub devices: Vec<usize>,
    pub load_model: Option<PathBuf>,
    pub seed: u64,
}

/// The complete, validated configuration of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub dataset: DatasetConfig,
    pub model: PotentialConfig,
    pub training: TrainingConfig,
}

impl DatasetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domains.is_empty() {
            return Err(invalid("domains", "at least one domain is required"));
        }
        if let Some(empty) = self.domains.iter().find(|d| d.trim().is_empty()) {
            return Err(invalid("domains", format!("blank domain identifier {empty:?}")));
        }
        let mut unique = self.domains.clone();
        unique.sort();
        unique.dedup();
        if unique.len() != self.domains.len() {
            return Err(invalid("domains", "domain identifiers must be unique"));
        }
        if self.temperatures.is_empty() {
            return Err(invalid("temperatures", "at least one temperature is required"));
        }
        if self.frame_stride == 0 {
            return Err(invalid("frame-stride", "must be at least 1"));
        }

        let sizes = [
            ("train-size", self.train_size),
            ("val-size", self.val_size),
            ("test-size", self.test_size),
        ];
        for (name, size) in sizes {
            if let SplitSize::Fraction(f) = size {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(invalid(name, format!("fraction {f} is outside (0, 1]")));
                }
            }
        }
        let remainders = sizes
            .iter()
            .filter(|(_, s)| *s == SplitSize::Remainder)
            .count();
        if remainders > 1 {
            return Err(ConfigError::Conflict(
                "at most one split size may be 'remainder'".to_string(),
            ));
        }

        let f = &self.filters;
        if let (Some(lo), Some(hi)) = (f.min_gyration_radius, f.max_gyration_radius) {
            if lo > hi {
                return Err(ConfigError::Conflict(format!(
                    "min-gyration-radius ({lo}) exceeds max-gyration-radius ({hi})"
                )));
            }
        }
        Ok(())
    }
}

/// Checks the model hyperparameters for values the potential cannot be built with.
pub fn validate_model(model: &PotentialConfig) -> Result<(), ConfigError> {
    if model.cutoff_lower < 0.0 {
        return Err(invalid("cutoff-lower", "must not be negative"));
    }
    if model.cutoff_lower >= model.cutoff_upper {
        return Err(ConfigError::Conflict(format!(
            "cutoff-lower ({}) must be below cutoff-upper ({})",
            model.cutoff_lower, model.cutoff_upper
        )));
    }
    for (name, value) in [
        ("embedding-dimension", model.embedding_dimension),
        ("num-layers", model.num_layers),
        ("num-rbf", model.num_rbf),
        ("max-z", model.max_z),
        ("max-num-neighbors", model.max_num_neighbors),
    ] {
        if value == 0 {
            return Err(invalid(name, "must be at least 1"));
        }
    }
    Ok(())
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("batch-size", self.batch_size),
            ("inference-batch-size", self.inference_batch_size),
            ("num-epochs", self.num_epochs),
            ("save-interval", self.save_interval),
            ("save-top-k", self.save_top_k),
        ] {
            if value == 0 {
                return Err(invalid(name, "must be at least 1"));
            }
        }
        if !(self.lr > 0.0) {
            return Err(invalid("lr", "must be positive"));
        }
        if self.lr_min < 0.0 || self.lr_min > self.lr {
            return Err(invalid("lr-min", "must lie between 0 and lr"));
        }
        if !(self.lr_factor > 0.0 && self.lr_factor < 1.0) {
            return Err(invalid("lr-factor", "must lie strictly between 0 and 1"));
        }
        if self.weight_decay < 0.0 {
            return Err(invalid("weight-decay", "must not be negative"));
        }
        if let Some(clip) = self.gradient_clipping {
            if !(clip > 0.0) {
                return Err(invalid("gradient-clipping", "must be positive"));
            }
        }
        if self.y_weight < 0.0 || self.neg_dy_weight < 0.0 {
            return Err(invalid("y-weight", "loss weights must not be negative"));
        }
        if self.y_weight == 0.0 && self.neg_dy_weight == 0.0 {
            return Err(ConfigError::Conflict(
                "y-weight and neg-dy-weight are both zero".to_string(),
            ));
        }
        if self.devices.len() > 1 {
            return Err(invalid(
                "devices",
                format!(
                    "{} devices requested; multi-device training is not supported",
                    self.devices.len()
                ),
            ));
        }
        Ok(())
    }
}

impl RunConfig {
    /// Validates the three sections together and creates the log directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for any invalid or contradictory setting, before any data
    /// or model work is done.
    pub fn new(
        dataset: DatasetConfig,
        model: PotentialConfig,
        training: TrainingConfig,
    ) -> Result<Self, ConfigError> {
        dataset.validate()?;
        validate_model(&model)?;
        training.validate()?;

        if training.neg_dy_weight > 0.0 && !model.derivative {
            return Err(ConfigError::Conflict(
                "neg-dy-weight is positive but derivative output is disabled".to_string(),
            ));
        }
        if training.accelerator == Accelerator::Gpu && training.precision == Precision::Double {
            return Err(ConfigError::Conflict(
                "64-bit precision is only available on the cpu accelerator".to_string(),
            ));
        }

        fs::create_dir_all(&training.log_dir).map_err(|e| ConfigError::LogDirectory {
            path: training.log_dir.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            dataset,
            model,
            training,
        })
    }

    pub fn save_toml(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, text).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reads a configuration written by [`RunConfig::save_toml`] and validates it again.
    pub fn load_toml(path: &Path) -> Result<Self, ConfigError> {
        let load_err = |message: String| ConfigError::Load {
            path: path.to_path_buf(),
            message,
        };
        let text = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let raw: RunConfig = toml::from_str(&text).map_err(|e| load_err(e.to_string()))?;
        Self::new(raw.dataset, raw.model, raw.training)
    }
}

#[derive(Default)]
pub struct DatasetConfigBuilder {
    root: Option<PathBuf>,
    remote_url: Option<String>,
    domains: Option<Vec<String>>,
    temperatures: Option<Vec<u32>>,
    frame_stride: Option<usize>,
    filters: DatasetFilters,
    train_size: Option<SplitSize>,
    val_size: Option<SplitSize>,
    test_size: Option<SplitSize>,
    splits_file: Option<PathBuf>,
    seed: Option<u64>,
}

impl DatasetConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, path: PathBuf) -> Self {
        self.root = Some(path);
        self
    }
    pub fn remote_url(mut self, url: Option<String>) -> Self {
        self.remote_url = url;
        self
    }
    pub fn domains(mut self, domains: Vec<String>) -> Self {
        self.domains = Some(domains);
        self
    }
    pub fn temperatures(mut self, temperatures: Vec<u32>) -> Self {
        self.temperatures = Some(temperatures);
        self
    }
    pub fn frame_stride(mut self, stride: usize) -> Self {
        self.frame_stride = Some(stride);
        self
    }
    pub fn filters(mut self, filters: DatasetFilters) -> Self {
        self.filters = filters;
        self
    }
    pub fn train_size(mut self, size: SplitSize) -> Self {
        self.train_size = Some(size);
        self
    }
    pub fn val_size(mut self, size: SplitSize) -> Self {
        self.val_size = Some(size);
        self
    }
    pub fn test_size(mut self, size: SplitSize) -> Self {
        self.test_size = Some(size);
        self
    }
    pub fn splits_file(mut self, path: Option<PathBuf>) -> Self {
        self.splits_file = path;
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<DatasetConfig, ConfigError> {
        let config = DatasetConfig {
            root: self.root.ok_or(ConfigError::MissingParameter("root"))?,
            remote_url: self.remote_url,
            domains: self
                .domains
                .ok_or(ConfigError::MissingParameter("domains"))?,
            temperatures: self
                .temperatures
                .ok_or(ConfigError::MissingParameter("temperatures"))?,
            frame_stride: self
                .frame_stride
                .ok_or(ConfigError::MissingParameter("frame_stride"))?,
            filters: self.filters,
            train_size: self
                .train_size
                .ok_or(ConfigError::MissingParameter("train_size"))?,
            val_size: self
                .val_size
                .ok_or(ConfigError::MissingParameter("val_size"))?,
            test_size: self
                .test_size
                .ok_or(ConfigError::MissingParameter("test_size"))?,
            splits_file: self.splits_file,
            seed: self.seed.ok_or(ConfigError::MissingParameter("seed"))?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Default)]
pub struct TrainingConfigBuilder {
    batch_size: Option<usize>,
    inference_batch_size: Option<usize>,
    lr: Option<f64>,
    weight_decay: Option<f64>,
    lr_warmup_steps: Option<usize>,
    lr_factor: Option<f64>,
    lr_patience: Option<usize>,
    lr_min: Option<f64>,
    gradient_clipping: Option<f64>,
    num_epochs: Option<usize>,
    y_weight: Option<f64>,
    neg_dy_weight: Option<f64>,
    log_dir: Option<PathBuf>,
    save_interval: Option<usize>,
    save_top_k: Option<usize>,
    num_workers: Option<usize>,
    precision_bits: Option<u32>,
    accelerator: Option<Accelerator>,
    devices: Vec<usize>,
    load_model: Option<PathBuf>,
    seed: Option<u64>,
}

impl TrainingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }
    pub fn inference_batch_size(mut self, n: usize) -> Self {
        self.inference_batch_size = Some(n);
        self
    }
    pub fn lr(mut self, lr: f64) -> Self {
        self.lr = Some(lr);
        self
    }
    pub fn weight_decay(mut self, decay: f64) -> Self {
        self.weight_decay = Some(decay);
        self
    }
    pub fn lr_warmup_steps(mut self, steps: usize) -> Self {
        self.lr_warmup_steps = Some(steps);
        self
    }
    pub fn lr_factor(mut self, factor: f64) -> Self {
        self.lr_factor = Some(factor);
        self
    }
    pub fn lr_patience(mut self, epochs: usize) -> Self {
        self.lr_patience = Some(epochs);
        self
    }
    pub fn lr_min(mut self, lr: f64) -> Self {
        self.lr_min = Some(lr);
        self
    }
    pub fn gradient_clipping(mut self, max_norm: Option<f64>) -> Self {
        self.gradient_clipping = max_norm;
        self
    }
    pub fn num_epochs(mut self, n: usize) -> Self {
        self.num_epochs = Some(n);
        self
    }
    pub fn y_weight(mut self, weight: f64) -> Self {
        self.y_weight = Some(weight);
        self
    }
    pub fn neg_dy_weight(mut self, weight: f64) -> Self {
        self.neg_dy_weight = Some(weight);
        self
    }
    pub fn log_dir(mut self, path: PathBuf) -> Self {
        self.log_dir = Some(path);
        self
    }
    pub fn save_interval(mut self, epochs: usize) -> Self {
        self.save_interval = Some(epochs);
        self
    }
    pub fn save_top_k(mut self, k: usize) -> Self {
        self.save_top_k = Some(k);
        self
    }
    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = Some(n);
        self
    }
    pub fn precision(mut self, bits: u32) -> Self {
        self.precision_bits = Some(bits);
        self
    }
    pub fn accelerator(mut self, accelerator: Accelerator) -> Self {
        self.accelerator = Some(accelerator);
        self
    }
    pub fn devices(mut self, devices: Vec<usize>) -> Self {
        self.devices = devices;
        self
    }
    pub fn load_model(mut self, path: Option<PathBuf>) -> Self {
        self.load_model = path;
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<TrainingConfig, ConfigError> {
        let bits = self
            .precision_bits
            .ok_or(ConfigError::MissingParameter("precision"))?;
        let precision = Precision::try_from(bits).map_err(|reason| invalid("precision", reason))?;

        let config = TrainingConfig {
            batch_size: self
                .batch_size
                .ok_or(ConfigError::MissingParameter("batch_size"))?,
            inference_batch_size: self
                .inference_batch_size
                .ok_or(ConfigError::MissingParameter("inference_batch_size"))?,
            lr: self.lr.ok_or(ConfigError::MissingParameter("lr"))?,
            weight_decay: self
                .weight_decay
                .ok_or(ConfigError::MissingParameter("weight_decay"))?,
            lr_warmup_steps: self
                .lr_warmup_steps
                .ok_or(ConfigError::MissingParameter("lr_warmup_steps"))?,
            lr_factor: self
                .lr_factor
                .ok_or(ConfigError::MissingParameter("lr_factor"))?,
            lr_patience: self
                .lr_patience
                .ok_or(ConfigError::MissingParameter("lr_patience"))?,
            lr_min: self.lr_min.ok_or(ConfigError::MissingParameter("lr_min"))?,
            gradient_clipping: self.gradient_clipping,
            num_epochs: self
                .num_epochs
                .ok_or(ConfigError::MissingParameter("num_epochs"))?,
            y_weight: self
                .y_weight
                .ok_or(ConfigError::MissingParameter("y_weight"))?,
            neg_dy_weight: self
                .neg_dy_weight
                .ok_or(ConfigError::MissingParameter("neg_dy_weight"))?,
            log_dir: self
                .log_dir
                .ok_or(ConfigError::MissingParameter("log_dir"))?,
            save_interval: self
                .save_interval
                .ok_or(ConfigError::MissingParameter("save_interval"))?,
            save_top_k: self
                .save_top_k
                .ok_or(ConfigError::MissingParameter("save_top_k"))?,
            num_workers: self
                .num_workers
                .ok_or(ConfigError::MissingParameter("num_workers"))?,
            precision,
            accelerator: self
                .accelerator
                .ok_or(ConfigError::MissingParameter("accelerator"))?,
            devices: self.devices,
            load_model: self.load_model,
            seed: self.seed.ok_or(ConfigError::MissingParameter("seed"))?,
        };
        config.validate()?;
        Ok(config)
    }
}
