use crate::error::CliError;
use cathnet::engine::device::{DeviceSelection, VISIBLE_DEVICES_VAR};
use tracing::info;

#[cfg(feature = "wgpu")]
pub type GpuBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

#[cfg(feature = "wgpu")]
pub fn gpu_device(selection: &DeviceSelection) -> burn::backend::wgpu::WgpuDevice {
    burn::backend::wgpu::WgpuDevice::DiscreteGpu(selection.ordinal)
}

#[cfg_attr(feature = "wgpu", allow(dead_code))]
pub fn gpu_unavailable() -> CliError {
    CliError::Argument(
        "the gpu accelerator requires a build with the 'wgpu' feature enabled".to_string(),
    )
}

/// Restricts the accelerator runtime to the selected devices.
///
/// Must run before the async runtime and any thread pool are started.
pub fn apply_device_mask(selection: &DeviceSelection) {
    if let Some(mask) = &selection.visible_mask {
        info!("Setting {}={}", VISIBLE_DEVICES_VAR, mask);
        // SAFETY: the process is still single-threaded at this point.
        unsafe { std::env::set_var(VISIBLE_DEVICES_VAR, mask) };
    }
}
