//! Hardware/fieldbus template catalog: instantiation is copy-on-add,
//! templates are never referenced by the configuration afterward.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::idgen::MappingIdGen;
use crate::core::model::{
    ByteOrder32, FieldbusDevice, FieldbusProtocol, FieldbusRegister, HardwareChannel,
    HardwareModule, RegisterDataType, SignalType,
};

fn default_scale_factor() -> f64 {
    1.0
}

/// One homogeneous channel group on a module template, e.g. 8x AI 4-20mA.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelTemplate {
    pub count: u32,
    pub signal_type: SignalType,
    pub electrical_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTemplate {
    pub model: String,
    pub manufacturer: String,
    pub name: String,
    pub channels: Vec<ChannelTemplate>,
    #[serde(default)]
    pub color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTemplate {
    pub name: String,
    pub signal_type: SignalType,
    pub data_type: RegisterDataType,
    pub address: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subslot: Option<u16>,
    pub byte_order: ByteOrder32,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTemplate {
    pub model: String,
    pub name: String,
    pub protocol: FieldbusProtocol,
    #[serde(default)]
    pub default_registers: Vec<RegisterTemplate>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCatalog {
    #[serde(default)]
    pub modules: Vec<ModuleTemplate>,
    #[serde(default)]
    pub devices: Vec<DeviceTemplate>,
}

impl TemplateCatalog {
    /// Missing file is treated as an empty catalog.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template catalog from: {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse template catalog JSON from: {}", path.display())
        })?;
        Ok(catalog)
    }
}

/// Instantiate a hardware module. Terminal labels are generated as
/// `rack:position.channel` with a 1-based channel number.
pub fn instantiate_module(
    template: &ModuleTemplate,
    rack_id: &str,
    rack_position: u32,
    idgen: &mut dyn MappingIdGen,
) -> HardwareModule {
    let module_id = idgen.next_id();
    let mut channels = Vec::new();
    let mut index: u32 = 0;
    for group in &template.channels {
        for _ in 0..group.count {
            channels.push(HardwareChannel {
                id: idgen.next_id(),
                module_id,
                index,
                signal_type: group.signal_type.clone(),
                electrical_type: group.electrical_type.clone(),
                terminal: format!("{rack_id}:{rack_position}.{}", index + 1),
                tag: String::new(),
            });
            index += 1;
        }
    }
    HardwareModule {
        id: module_id,
        rack_id: rack_id.to_string(),
        rack_position,
        model: template.model.clone(),
        name: template.name.clone(),
        channels,
    }
}

/// Instantiate a fieldbus device; the register list is copied from the
/// template and edited independently afterward.
pub fn instantiate_device(
    template: &DeviceTemplate,
    name: &str,
    ip_address: &str,
    port: u16,
    unit_id: u8,
    poll_rate_ms: u32,
    idgen: &mut dyn MappingIdGen,
) -> FieldbusDevice {
    let device_id = idgen.next_id();
    let registers = template
        .default_registers
        .iter()
        .map(|r| FieldbusRegister {
            id: idgen.next_id(),
            device_id,
            name: r.name.clone(),
            signal_type: r.signal_type.clone(),
            data_type: r.data_type.clone(),
            address: r.address,
            slot: r.slot,
            subslot: r.subslot,
            byte_order: r.byte_order.clone(),
            scale_factor: r.scale_factor,
        })
        .collect();
    FieldbusDevice {
        id: device_id,
        model: template.model.clone(),
        name: name.to_string(),
        protocol: template.protocol.clone(),
        ip_address: ip_address.to_string(),
        port,
        unit_id,
        poll_rate_ms,
        registers,
    }
}
