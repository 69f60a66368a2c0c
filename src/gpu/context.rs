//! Device and queue creation

use super::error_recovery::GpuErrorRecovery;
use crate::error::{HiabError, HiabResult};
use std::sync::Arc;

/// Device, queue and health tracker shared by every GPU pass
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
    pub recovery: GpuErrorRecovery,
}

impl GpuContext {
    /// Wrap a device created by the embedding application
    pub fn from_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        adapter_info: wgpu::AdapterInfo,
    ) -> Self {
        let recovery = GpuErrorRecovery::new(&device);
        Self {
            device,
            queue,
            adapter_info,
            recovery,
        }
    }

    /// Pick an adapter without a surface and open a device on it
    pub async fn new_headless() -> HiabResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(HiabError::DeviceNotFound)?;

        let adapter_info = adapter.get_info();
        log::info!(
            "[GpuContext] Using {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("hiab device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: adapter_limits.max_texture_dimension_2d,
                        ..wgpu::Limits::default()
                    },
                },
                None,
            )
            .await?;

        Ok(Self::from_device(Arc::new(device), Arc::new(queue), adapter_info))
    }

    /// Blocking wrapper around [`GpuContext::new_headless`]
    pub fn new_headless_blocking() -> HiabResult<Self> {
        pollster::block_on(Self::new_headless())
    }

    /// Largest heap backing store edge the device can hold
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}
