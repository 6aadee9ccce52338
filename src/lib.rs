//! Core I/O mapping engine crate.
//! Responsibilities: hardware/fieldbus inventory model, signal binding CRUD,
//! mapping validation, deterministic export serializers.
//! Non-goals: live device communication, persistence, UI (handled by upper layers).

pub mod core;
pub mod error;
pub mod usecase;

pub use crate::core::idgen::{MappingIdGen, SequenceIdGen, UuidIdGen};
pub use crate::core::model::{
    ApplicationSignal, ByteOrder32, Configuration, ExportWarning, FieldbusDevice,
    FieldbusProtocol, FieldbusRegister, HardwareChannel, HardwareModule, Issue, IssueCategory,
    IssueSeverity, Mapping, MappingSource, MappingStatus, RegisterDataType, SignalScaling,
    SignalType, SCHEMA_VERSION_V1,
};
pub use crate::core::template::{
    ChannelTemplate, DeviceTemplate, ModuleTemplate, RegisterTemplate, TemplateCatalog,
};
pub use crate::error::MappingError;
pub use crate::usecase::service::MappingService;
pub use crate::usecase::validate::validate;
