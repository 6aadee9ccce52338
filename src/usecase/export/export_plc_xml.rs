//! 层级式 PLC 导入 XML 导出（冻结规范 v1）。
//!
//! 约束：
//! - 元素/属性名逐字冻结：PlcIoConfig / Project / Nodes / Node / Module /
//!   Channel / Terminal / Tag / ElectricalType / Description / Mapping /
//!   AppSignal / AppSignalType / AppDataType / Scaling / Grounded / Unmapped /
//!   COMDevices / Device / Register / MappingSummary / Entry。
//! - 两空格缩进；同配置 + 同 generatedAtUtc 重复导出字节一致。
//! - 配置不一致不失败：缺失信号以原始 id 渲染并产出告警码。

use std::collections::HashMap;
use std::io;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::core::model::{
    ApplicationSignal, Configuration, ExportWarning, FieldbusDevice, FieldbusRegister,
    HardwareChannel, HardwareModule, Mapping, MappingSource, SignalScaling, SCHEMA_VERSION_V1,
};
use crate::core::rows::{index_mappings, register_locator, sorted_modules};
use crate::usecase::export::{elapsed_ms, ExportDiagnostics, GENERATOR_TAG};

#[derive(Debug, Error)]
pub enum ExportXmlError {
    #[error("xml write error: {0}")]
    Io(#[from] io::Error),

    #[error("xml output is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Clone, Debug)]
pub struct ExportXmlOutcome {
    pub xml: String,
    pub warnings: Vec<ExportWarning>,
    pub diagnostics: ExportDiagnostics,
}

fn emit<W: io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> io::Result<()> {
    writer
        .write_event(event)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

fn text_element<W: io::Write>(writer: &mut Writer<W>, name: &str, value: &str) -> io::Result<()> {
    if value.is_empty() {
        return emit(writer, Event::Empty(BytesStart::new(name)));
    }
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

pub fn export_plc_xml(
    config: &Configuration,
    signals: &[ApplicationSignal],
    generated_at_utc: DateTime<Utc>,
) -> Result<ExportXmlOutcome, ExportXmlError> {
    let started = Instant::now();
    let index = index_mappings(config);
    let signal_map: HashMap<&str, &ApplicationSignal> =
        signals.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut warnings: Vec<ExportWarning> = Vec::new();
    let mut point_count: u32 = 0;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let schema_version = SCHEMA_VERSION_V1.to_string();
    let generated = generated_at_utc.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut root = BytesStart::new("PlcIoConfig");
    root.push_attribute(("schemaVersion", schema_version.as_str()));
    root.push_attribute(("generatedAtUtc", generated.as_str()));
    root.push_attribute(("generator", GENERATOR_TAG));
    emit(&mut writer, Event::Start(root))?;

    let version = config.version.to_string();
    let mut project = BytesStart::new("Project");
    project.push_attribute(("name", config.project_name.as_str()));
    project.push_attribute(("version", version.as_str()));
    emit(&mut writer, Event::Empty(project))?;

    emit(&mut writer, Event::Start(BytesStart::new("Nodes")))?;
    let mut current_rack: Option<&str> = None;
    for module in sorted_modules(config) {
        if current_rack != Some(module.rack_id.as_str()) {
            if current_rack.is_some() {
                emit(&mut writer, Event::End(BytesEnd::new("Node")))?;
            }
            let mut node = BytesStart::new("Node");
            node.push_attribute(("rackId", module.rack_id.as_str()));
            emit(&mut writer, Event::Start(node))?;
            current_rack = Some(module.rack_id.as_str());
        }
        write_module(&mut writer, module, &index.by_channel, &signal_map, &mut warnings)?;
        point_count += module.channels.len() as u32;
    }
    if current_rack.is_some() {
        emit(&mut writer, Event::End(BytesEnd::new("Node")))?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("Nodes")))?;

    emit(&mut writer, Event::Start(BytesStart::new("COMDevices")))?;
    for device in &config.devices {
        write_device(&mut writer, device, &index.by_register, &signal_map, &mut warnings)?;
        point_count += device.registers.len() as u32;
    }
    emit(&mut writer, Event::End(BytesEnd::new("COMDevices")))?;

    write_summary(&mut writer, config, signals, &index.by_signal, &mut warnings)?;

    emit(&mut writer, Event::End(BytesEnd::new("PlcIoConfig")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    let xml = String::from_utf8(bytes)?;

    Ok(ExportXmlOutcome {
        xml,
        warnings,
        diagnostics: ExportDiagnostics {
            exported_rows: point_count,
            duration_ms: elapsed_ms(started),
        },
    })
}

fn write_module<W: io::Write>(
    writer: &mut Writer<W>,
    module: &HardwareModule,
    by_channel: &HashMap<uuid::Uuid, &Mapping>,
    signal_map: &HashMap<&str, &ApplicationSignal>,
    warnings: &mut Vec<ExportWarning>,
) -> io::Result<()> {
    let id = module.id.to_string();
    let rack_position = module.rack_position.to_string();
    let mut elem = BytesStart::new("Module");
    elem.push_attribute(("id", id.as_str()));
    elem.push_attribute(("model", module.model.as_str()));
    elem.push_attribute(("name", module.name.as_str()));
    elem.push_attribute(("rackPosition", rack_position.as_str()));
    emit(writer, Event::Start(elem))?;

    for channel in &module.channels {
        write_channel(writer, channel, by_channel.get(&channel.id).copied(), signal_map, warnings)?;
    }

    emit(writer, Event::End(BytesEnd::new("Module")))
}

fn write_channel<W: io::Write>(
    writer: &mut Writer<W>,
    channel: &HardwareChannel,
    mapping: Option<&Mapping>,
    signal_map: &HashMap<&str, &ApplicationSignal>,
    warnings: &mut Vec<ExportWarning>,
) -> io::Result<()> {
    let channel_index = channel.index.to_string();
    let mut elem = BytesStart::new("Channel");
    elem.push_attribute(("index", channel_index.as_str()));
    elem.push_attribute(("signalType", channel.signal_type.as_str()));
    emit(writer, Event::Start(elem))?;

    let description = mapping
        .and_then(|m| signal_map.get(m.application_signal_id.as_str()))
        .map(|s| s.signal_path())
        .unwrap_or_default();
    text_element(writer, "Terminal", &channel.terminal)?;
    text_element(writer, "Tag", &channel.tag)?;
    text_element(writer, "ElectricalType", &channel.electrical_type)?;
    text_element(writer, "Description", &description)?;

    write_mapping_state(writer, mapping, &channel.terminal, signal_map, warnings)?;

    emit(writer, Event::End(BytesEnd::new("Channel")))
}

fn write_device<W: io::Write>(
    writer: &mut Writer<W>,
    device: &FieldbusDevice,
    by_register: &HashMap<uuid::Uuid, &Mapping>,
    signal_map: &HashMap<&str, &ApplicationSignal>,
    warnings: &mut Vec<ExportWarning>,
) -> io::Result<()> {
    let id = device.id.to_string();
    let port = device.port.to_string();
    let unit_id = device.unit_id.to_string();
    let poll_rate = device.poll_rate_ms.to_string();
    let mut elem = BytesStart::new("Device");
    elem.push_attribute(("id", id.as_str()));
    elem.push_attribute(("model", device.model.as_str()));
    elem.push_attribute(("name", device.name.as_str()));
    elem.push_attribute(("protocol", device.protocol.as_str()));
    elem.push_attribute(("ipAddress", device.ip_address.as_str()));
    elem.push_attribute(("port", port.as_str()));
    elem.push_attribute(("unitId", unit_id.as_str()));
    elem.push_attribute(("pollRateMs", poll_rate.as_str()));
    emit(writer, Event::Start(elem))?;

    for register in &device.registers {
        write_register(
            writer,
            device,
            register,
            by_register.get(&register.id).copied(),
            signal_map,
            warnings,
        )?;
    }

    emit(writer, Event::End(BytesEnd::new("Device")))
}

fn write_register<W: io::Write>(
    writer: &mut Writer<W>,
    device: &FieldbusDevice,
    register: &FieldbusRegister,
    mapping: Option<&Mapping>,
    signal_map: &HashMap<&str, &ApplicationSignal>,
    warnings: &mut Vec<ExportWarning>,
) -> io::Result<()> {
    let address = register.address.to_string();
    let scale_factor = register.scale_factor.to_string();
    let slot = register.slot.map(|v| v.to_string());
    let subslot = register.subslot.map(|v| v.to_string());
    let mut elem = BytesStart::new("Register");
    elem.push_attribute(("name", register.name.as_str()));
    elem.push_attribute(("signalType", register.signal_type.as_str()));
    elem.push_attribute(("dataType", register.data_type.as_str()));
    elem.push_attribute(("address", address.as_str()));
    if let Some(slot) = &slot {
        elem.push_attribute(("slot", slot.as_str()));
    }
    if let Some(subslot) = &subslot {
        elem.push_attribute(("subslot", subslot.as_str()));
    }
    elem.push_attribute(("byteOrder", register.byte_order.as_str()));
    elem.push_attribute(("scaleFactor", scale_factor.as_str()));
    emit(writer, Event::Start(elem))?;

    let locator = register_locator(device, register);
    write_mapping_state(writer, mapping, &locator, signal_map, warnings)?;

    emit(writer, Event::End(BytesEnd::new("Register")))
}

/// 每个物理点恰好一个状态子块：Mapping、Grounded 或 Unmapped。
fn write_mapping_state<W: io::Write>(
    writer: &mut Writer<W>,
    mapping: Option<&Mapping>,
    locator: &str,
    signal_map: &HashMap<&str, &ApplicationSignal>,
    warnings: &mut Vec<ExportWarning>,
) -> io::Result<()> {
    let Some(mapping) = mapping else {
        return emit(writer, Event::Empty(BytesStart::new("Unmapped")));
    };

    if mapping.grounded {
        let value = mapping.ground_value.clone().unwrap_or_default();
        let mut elem = BytesStart::new("Grounded");
        elem.push_attribute(("value", value.as_str()));
        return emit(writer, Event::Empty(elem));
    }

    let mapping_id = mapping.id.to_string();
    let mut elem = BytesStart::new("Mapping");
    elem.push_attribute(("mappingId", mapping_id.as_str()));
    emit(writer, Event::Start(elem))?;

    match signal_map.get(mapping.application_signal_id.as_str()) {
        Some(signal) => {
            text_element(writer, "AppSignal", &signal.signal_path())?;
            text_element(writer, "AppSignalType", signal.signal_type.as_str())?;
            text_element(writer, "AppDataType", signal.data_type.as_deref().unwrap_or(""))?;
        }
        None => {
            text_element(writer, "AppSignal", &mapping.application_signal_id)?;
            text_element(writer, "AppSignalType", "")?;
            text_element(writer, "AppDataType", "")?;
            warnings.push(ExportWarning {
                code: "MAPPING_SIGNAL_MISSING".to_string(),
                message: format!(
                    "mapping references signal '{}' which is not in the catalog",
                    mapping.application_signal_id
                ),
                mapping_id: Some(mapping.id),
                point: Some(locator.to_string()),
                signal_id: Some(mapping.application_signal_id.clone()),
            });
        }
    }
    if let Some(scaling) = &mapping.scaling {
        write_scaling(writer, scaling)?;
    }

    emit(writer, Event::End(BytesEnd::new("Mapping")))
}

fn write_scaling<W: io::Write>(writer: &mut Writer<W>, scaling: &SignalScaling) -> io::Result<()> {
    let raw_min = scaling.raw_min.to_string();
    let raw_max = scaling.raw_max.to_string();
    let eng_min = scaling.eng_min.to_string();
    let eng_max = scaling.eng_max.to_string();
    let filter_ms = scaling.filter_ms.to_string();
    let mut elem = BytesStart::new("Scaling");
    elem.push_attribute(("rawMin", raw_min.as_str()));
    elem.push_attribute(("rawMax", raw_max.as_str()));
    elem.push_attribute(("engMin", eng_min.as_str()));
    elem.push_attribute(("engMax", eng_max.as_str()));
    elem.push_attribute(("unit", scaling.unit.as_str()));
    elem.push_attribute(("clampEnabled", if scaling.clamp_enabled { "true" } else { "false" }));
    elem.push_attribute(("filterMs", filter_ms.as_str()));
    emit(writer, Event::Empty(elem))
}

/// MappingSummary 按信号目录顺序列出每个已绑定/接地的信号与解析后的定位串。
fn write_summary<W: io::Write>(
    writer: &mut Writer<W>,
    config: &Configuration,
    signals: &[ApplicationSignal],
    by_signal: &HashMap<&str, &Mapping>,
    warnings: &mut Vec<ExportWarning>,
) -> io::Result<()> {
    emit(writer, Event::Start(BytesStart::new("MappingSummary")))?;
    for signal in signals {
        let Some(mapping) = by_signal.get(signal.id.as_str()) else {
            continue;
        };
        let (source, locator) = if mapping.grounded {
            ("grounded", "grounded".to_string())
        } else {
            match &mapping.source {
                Some(MappingSource::Hw { channel_id }) => match config.find_channel(*channel_id) {
                    Some((_, channel)) => ("hw", channel.terminal.clone()),
                    None => {
                        push_source_missing(warnings, mapping, signal);
                        continue;
                    }
                },
                Some(MappingSource::Com { register_id }) => {
                    match config.find_register(*register_id) {
                        Some((device, register)) => ("com", register_locator(device, register)),
                        None => {
                            push_source_missing(warnings, mapping, signal);
                            continue;
                        }
                    }
                }
                None => continue,
            }
        };
        let path = signal.signal_path();
        let mut entry = BytesStart::new("Entry");
        entry.push_attribute(("signal", path.as_str()));
        entry.push_attribute(("signalId", signal.id.as_str()));
        entry.push_attribute(("source", source));
        entry.push_attribute(("locator", locator.as_str()));
        emit(writer, Event::Empty(entry))?;
    }
    emit(writer, Event::End(BytesEnd::new("MappingSummary")))
}

fn push_source_missing(
    warnings: &mut Vec<ExportWarning>,
    mapping: &Mapping,
    signal: &ApplicationSignal,
) {
    warnings.push(ExportWarning {
        code: "MAPPING_SOURCE_MISSING".to_string(),
        message: format!(
            "signal {} is bound to a source missing from the inventory",
            signal.signal_path()
        ),
        mapping_id: Some(mapping.id),
        point: None,
        signal_id: Some(signal.id.clone()),
    });
}
