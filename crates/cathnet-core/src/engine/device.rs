use super::config::{Accelerator, Precision, TrainingConfig};
use burn::backend::{Autodiff, NdArray};

/// Environment variable that restricts which GPUs the accelerator runtime can see.
pub const VISIBLE_DEVICES_VAR: &str = "CUDA_VISIBLE_DEVICES";

/// The default CPU training backend for a float element type.
pub type CpuBackend<F = f32> = Autodiff<NdArray<F>>;

/// Resolved placement of a run's computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelection {
    pub accelerator: Accelerator,
    pub precision: Precision,
    /// Ordinal of the device to use among the visible ones.
    pub ordinal: usize,
    /// Value for [`VISIBLE_DEVICES_VAR`], when the run names its devices.
    pub visible_mask: Option<String>,
}

impl DeviceSelection {
    pub fn from_config(config: &TrainingConfig) -> Self {
        let visible_mask = match config.accelerator {
            Accelerator::Gpu if !config.devices.is_empty() => Some(
                config
                    .devices
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        };
        Self {
            accelerator: config.accelerator,
            precision: config.precision,
            // the mask renumbers the selected device to 0
            ordinal: 0,
            visible_mask,
        }
    }

    pub fn describe(&self) -> String {
        let bits = u32::from(self.precision);
        match (&self.accelerator, &self.visible_mask) {
            (Accelerator::Cpu, _) => format!("cpu ({bits}-bit)"),
            (Accelerator::Gpu, Some(mask)) => format!("gpu {mask} ({bits}-bit)"),
            (Accelerator::Gpu, None) => format!("gpu ({bits}-bit)"),
        }
    }
}
