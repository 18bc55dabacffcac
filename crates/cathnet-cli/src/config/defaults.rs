use cathnet::data::split::SplitSize;
use cathnet::engine::config::Accelerator;
use std::path::PathBuf;

/// Values used for any key that neither the config file, the flags nor `--set` provide.
///
/// Model hyperparameters default through `PotentialConfig::new()` instead.
pub struct DefaultsConfig {
    pub temperatures: Vec<u32>,
    pub frame_stride: usize,
    pub train_size: SplitSize,
    pub val_size: SplitSize,
    pub test_size: SplitSize,
    pub seed: u64,

    pub batch_size: usize,
    pub inference_batch_size: usize,
    pub lr: f64,
    pub weight_decay: f64,
    pub lr_warmup_steps: usize,
    pub lr_factor: f64,
    pub lr_patience: usize,
    pub lr_min: f64,
    pub num_epochs: usize,
    pub y_weight: f64,
    pub neg_dy_weight: f64,
    pub log_dir: PathBuf,
    pub save_interval: usize,
    pub save_top_k: usize,
    pub num_workers: usize,
    pub precision: u32,
    pub accelerator: Accelerator,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temperatures: vec![348],
            frame_stride: 10,
            train_size: SplitSize::Fraction(0.8),
            val_size: SplitSize::Fraction(0.1),
            test_size: SplitSize::Remainder,
            seed: 1,

            batch_size: 3,
            inference_batch_size: 16,
            lr: 1e-4,
            weight_decay: 0.0,
            lr_warmup_steps: 0,
            lr_factor: 0.8,
            lr_patience: 15,
            lr_min: 1e-7,
            num_epochs: 100,
            y_weight: 1.0,
            neg_dy_weight: 1.0,
            log_dir: PathBuf::from("logs"),
            save_interval: 1,
            save_top_k: 3,
            num_workers: 4,
            precision: 32,
            accelerator: Accelerator::Cpu,
        }
    }
}
