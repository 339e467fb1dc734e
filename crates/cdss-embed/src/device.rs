use candle_core::Device;
use tracing::{info, warn};

pub fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(dev) = Device::new_cuda(0) { info!("device: CUDA"); return dev; }
    }
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { info!("device: Metal (MPS)"); return dev; }
    }
    info!("device: CPU");
    Device::Cpu
}

/// Bounds one model invocation on the device.
///
/// Declare it before any tensor of the invocation: it drops last, after the
/// tensors, and waits for the device queue so their buffers are reclaimed
/// before the next call. Other in-flight invocations are not touched.
pub struct DeviceScope<'a> {
    device: &'a Device,
}

impl<'a> DeviceScope<'a> {
    pub fn enter(device: &'a Device) -> Self {
        Self { device }
    }
}

impl Drop for DeviceScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.synchronize() {
            warn!("device synchronize failed: {}", e);
        }
    }
}
