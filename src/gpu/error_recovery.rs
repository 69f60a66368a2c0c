//! GPU error tracking
//!
//! wgpu reports most failures asynchronously. Resource creation is wrapped in
//! error scopes so allocation and validation failures become `HiabError` values
//! at the call site; anything escaping a scope lands in the uncaptured handler,
//! which marks the device unusable.

use crate::error::{HiabError, HiabResult};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Device health shared with the uncaptured-error callback
pub struct GpuErrorRecovery {
    device_lost: Arc<AtomicBool>,
    uncaptured_errors: Arc<AtomicU32>,
}

impl GpuErrorRecovery {
    /// Install the uncaptured-error handler on `device`
    pub fn new(device: &wgpu::Device) -> Self {
        let device_lost = Arc::new(AtomicBool::new(false));
        let uncaptured_errors = Arc::new(AtomicU32::new(0));
        let lost = Arc::clone(&device_lost);
        let count = Arc::clone(&uncaptured_errors);

        device.on_uncaptured_error(Box::new(move |error| {
            count.fetch_add(1, Ordering::Relaxed);
            match error {
                wgpu::Error::OutOfMemory { .. } => {
                    log::error!("[GpuErrorRecovery] GPU out of memory");
                    lost.store(true, Ordering::Relaxed);
                }
                wgpu::Error::Validation { description, .. } => {
                    log::error!("[GpuErrorRecovery] GPU validation error: {}", description);
                }
            }
        }));

        Self {
            device_lost,
            uncaptured_errors,
        }
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Relaxed)
    }

    pub fn uncaptured_error_count(&self) -> u32 {
        self.uncaptured_errors.load(Ordering::Relaxed)
    }

    /// Fail fast once the device has run out of memory
    pub fn ensure_device(&self) -> HiabResult<()> {
        if self.is_device_lost() {
            return Err(HiabError::Internal {
                message: "GPU device lost".to_string(),
            });
        }
        Ok(())
    }
}

/// Run `create` inside out-of-memory and validation scopes; a captured error becomes
/// `ResourceCreationFailed` for `resource` of `size` bytes
pub fn create_checked<T>(
    device: &wgpu::Device,
    resource: &str,
    size: u64,
    create: impl FnOnce() -> T,
) -> HiabResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match out_of_memory.or(validation) {
        None => Ok(value),
        Some(error) => {
            log::error!(
                "[create_checked] Creating {} ({} bytes) failed: {}",
                resource,
                size,
                error
            );
            Err(HiabError::ResourceCreationFailed {
                resource: resource.to_string(),
                size,
                error: error.to_string(),
            })
        }
    }
}
