/// GPU Module - device plumbing shared by the renderer passes
///
/// - context.rs: adapter/device/queue creation
/// - error_recovery.rs: error scopes and device health
/// - program_slots.rs: named-slot registry behind every GPU program

pub mod context;
pub mod error_recovery;
pub mod program_slots;

pub use context::GpuContext;
pub use error_recovery::{create_checked, GpuErrorRecovery};
pub use program_slots::{
    storage_binding, storage_texture_binding, uint_texture_binding, uniform_binding,
    ProgramSlots, SlotInfo,
};
