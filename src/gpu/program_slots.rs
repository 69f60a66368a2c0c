//! Named-slot registry for GPU programs
//!
//! Each program owns one bind group whose binding indices are assigned in
//! registration order. The registry is the single source for the bind group
//! layout, the WGSL binding header prepended to the program's source, and the
//! bind groups built from `(slot name, resource)` pairs.

use crate::error::{HiabError, HiabResult};
use std::collections::HashMap;
use wgpu::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BufferBindingType,
    ShaderStages, StorageTextureAccess, TextureFormat, TextureSampleType,
};

/// One registered slot
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub name: String,
    pub binding: u32,
    pub ty: BindingType,
    pub visibility: ShaderStages,
    /// WGSL type of the declared variable
    pub wgsl_type: String,
}

/// Slots of one program's bind group
#[derive(Debug, Clone)]
pub struct ProgramSlots {
    program: String,
    group: u32,
    slots: Vec<SlotInfo>,
    by_name: HashMap<String, usize>,
}

impl ProgramSlots {
    pub fn new(program: impl Into<String>, group: u32) -> Self {
        Self {
            program: program.into(),
            group,
            slots: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Register a slot and get its binding index; re-registering a name returns the
    /// existing index
    pub fn register(
        &mut self,
        name: impl Into<String>,
        ty: BindingType,
        visibility: ShaderStages,
        wgsl_type: impl Into<String>,
    ) -> u32 {
        let name = name.into();
        if let Some(&index) = self.by_name.get(&name) {
            return self.slots[index].binding;
        }

        let binding = self.slots.len() as u32;
        self.by_name.insert(name.clone(), self.slots.len());
        self.slots.push(SlotInfo {
            name,
            binding,
            ty,
            visibility,
            wgsl_type: wgsl_type.into(),
        });
        binding
    }

    /// Register a texture slot; its WGSL type follows from the binding type
    pub fn register_texture(
        &mut self,
        name: impl Into<String>,
        ty: BindingType,
        visibility: ShaderStages,
    ) -> u32 {
        let wgsl_type = texture_wgsl_type(&ty);
        self.register(name, ty, visibility, wgsl_type)
    }

    /// Binding index of a named slot
    pub fn slot(&self, name: &str) -> HiabResult<u32> {
        self.by_name
            .get(name)
            .map(|&index| self.slots[index].binding)
            .ok_or_else(|| HiabError::UnknownProgramSlot {
                program: self.program.clone(),
                slot: name.to_string(),
            })
    }

    pub fn layout_entries(&self) -> Vec<BindGroupLayoutEntry> {
        self.slots
            .iter()
            .map(|slot| BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: slot.visibility,
                ty: slot.ty,
                count: None,
            })
            .collect()
    }

    pub fn create_layout(&self, device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let entries = self.layout_entries();
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&self.program),
            entries: &entries,
        })
    }

    /// WGSL declarations of every slot, in binding order
    pub fn generate_wgsl(&self) -> String {
        let mut wgsl = String::new();
        for slot in &self.slots {
            wgsl.push_str(&format!(
                "@group({}) @binding({}) var{} {}: {};\n",
                self.group,
                slot.binding,
                wgsl_qualifier(&slot.ty),
                slot.name,
                slot.wgsl_type,
            ));
        }
        wgsl
    }

    /// Build a bind group; every registered slot must be supplied exactly once
    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        resources: Vec<(&str, wgpu::BindingResource<'_>)>,
    ) -> HiabResult<wgpu::BindGroup> {
        let mut entries = Vec::with_capacity(resources.len());
        for (name, resource) in resources {
            entries.push(wgpu::BindGroupEntry {
                binding: self.slot(name)?,
                resource,
            });
        }
        if entries.len() != self.slots.len() {
            let missing = self
                .slots
                .iter()
                .find(|slot| !entries.iter().any(|e| e.binding == slot.binding))
                .map(|slot| slot.name.clone())
                .unwrap_or_default();
            return Err(HiabError::UnknownProgramSlot {
                program: self.program.clone(),
                slot: missing,
            });
        }
        entries.sort_by_key(|e| e.binding);

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        }))
    }
}

/// Uniform block binding
pub fn uniform_binding(dynamic: bool) -> BindingType {
    BindingType::Buffer {
        ty: BufferBindingType::Uniform,
        has_dynamic_offset: dynamic,
        min_binding_size: None,
    }
}

/// Storage buffer binding
pub fn storage_binding(read_only: bool) -> BindingType {
    BindingType::Buffer {
        ty: BufferBindingType::Storage { read_only },
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

/// Unsigned integer texture read with `textureLoad`
pub fn uint_texture_binding() -> BindingType {
    BindingType::Texture {
        sample_type: TextureSampleType::Uint,
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    }
}

/// Write-only storage texture
pub fn storage_texture_binding(format: TextureFormat) -> BindingType {
    BindingType::StorageTexture {
        access: StorageTextureAccess::WriteOnly,
        format,
        view_dimension: wgpu::TextureViewDimension::D2,
    }
}

fn wgsl_qualifier(ty: &BindingType) -> &'static str {
    match ty {
        BindingType::Buffer { ty, .. } => match ty {
            BufferBindingType::Uniform => "<uniform>",
            BufferBindingType::Storage { read_only: true } => "<storage, read>",
            BufferBindingType::Storage { read_only: false } => "<storage, read_write>",
        },
        _ => "",
    }
}

fn texel_format_name(format: TextureFormat) -> &'static str {
    match format {
        TextureFormat::Rgba32Uint => "rgba32uint",
        TextureFormat::Rg32Uint => "rg32uint",
        TextureFormat::R32Uint => "r32uint",
        TextureFormat::Rgba8Unorm => "rgba8unorm",
        TextureFormat::Rgba32Float => "rgba32float",
        _ => "unsupported",
    }
}

fn texture_wgsl_type(ty: &BindingType) -> String {
    match ty {
        BindingType::Texture { sample_type, .. } => match sample_type {
            TextureSampleType::Uint => "texture_2d<u32>".to_string(),
            TextureSampleType::Sint => "texture_2d<i32>".to_string(),
            _ => "texture_2d<f32>".to_string(),
        },
        BindingType::StorageTexture { format, access, .. } => {
            let access = match access {
                StorageTextureAccess::WriteOnly => "write",
                StorageTextureAccess::ReadOnly => "read",
                StorageTextureAccess::ReadWrite => "read_write",
            };
            format!("texture_storage_2d<{}, {}>", texel_format_name(*format), access)
        }
        BindingType::Sampler(_) => "sampler".to_string(),
        _ => "unknown".to_string(),
    }
}
