//! 导出用平面 I/O 行构建：硬件通道行 + 总线寄存器行 + 尾部虚拟信号行。
//!
//! 行顺序（全导出格式统一）：
//! - 模块按 (rackId, rackPosition) 升序，通道保持模块内顺序
//! - 设备与寄存器保持目录顺序
//! - 无物理源的应用信号（接地/未映射）按目录顺序排在最后
//!
//! 配置不一致（悬挂引用、重复源）不会失败：行降级渲染并产出告警码。

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::core::model::{
    ApplicationSignal, Configuration, ExportWarning, FieldbusDevice, FieldbusRegister,
    HardwareModule, Mapping, SignalScaling, SignalType,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowSection {
    Hardware,
    Fieldbus,
    Virtual,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowStatus {
    Mapped,
    Grounded,
    Unmapped,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Mapped => "mapped",
            RowStatus::Grounded => "grounded",
            RowStatus::Unmapped => "unmapped",
        }
    }
}

/// 一行 = 一个物理点或一个虚拟信号点；空字符串列由渲染层决定占位符。
#[derive(Clone, Debug, PartialEq)]
pub struct IoRow {
    pub index: u32,
    pub section: RowSection,
    pub location: String,
    pub slot: String,
    pub point: String,
    pub tag: String,
    pub signal_type: Option<SignalType>,
    pub electrical: String,
    pub status: RowStatus,
    pub component_name: String,
    pub signal_name: String,
    pub app_signal_type: Option<SignalType>,
    pub app_data_type: String,
    pub scaling: Option<SignalScaling>,
    pub grounded: bool,
    pub ground_value: String,
    pub notes: String,
    pub channel_id: Option<Uuid>,
    pub register_id: Option<Uuid>,
    pub mapping_id: Option<Uuid>,
    pub signal_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IoRowsOutput {
    pub rows: Vec<IoRow>,
    pub warnings: Vec<ExportWarning>,
}

pub struct MappingIndex<'a> {
    pub by_channel: HashMap<Uuid, &'a Mapping>,
    pub by_register: HashMap<Uuid, &'a Mapping>,
    pub by_signal: HashMap<&'a str, &'a Mapping>,
}

/// 重复源/重复目标以数组首条为准（duplicate 由校验层上报）。
pub fn index_mappings(config: &Configuration) -> MappingIndex<'_> {
    let mut by_channel: HashMap<Uuid, &Mapping> = HashMap::new();
    let mut by_register: HashMap<Uuid, &Mapping> = HashMap::new();
    let mut by_signal: HashMap<&str, &Mapping> = HashMap::new();
    for mapping in &config.mappings {
        if let Some(channel_id) = mapping.source_channel_id() {
            by_channel.entry(channel_id).or_insert(mapping);
        }
        if let Some(register_id) = mapping.source_register_id() {
            by_register.entry(register_id).or_insert(mapping);
        }
        by_signal
            .entry(mapping.application_signal_id.as_str())
            .or_insert(mapping);
    }
    MappingIndex {
        by_channel,
        by_register,
        by_signal,
    }
}

/// 机架排序：(rackId, rackPosition) 升序。
pub fn sorted_modules(config: &Configuration) -> Vec<&HardwareModule> {
    let mut modules: Vec<&HardwareModule> = config.modules.iter().collect();
    modules.sort_by(|a, b| {
        a.rack_id
            .cmp(&b.rack_id)
            .then_with(|| a.rack_position.cmp(&b.rack_position))
    });
    modules
}

/// 寄存器在 "Slot/Address" 列的显示：PROFINET 槽位优先，否则寄存器地址。
pub fn register_address_display(register: &FieldbusRegister) -> String {
    match (register.slot, register.subslot) {
        (Some(slot), Some(subslot)) => format!("{slot}.{subslot}"),
        (Some(slot), None) => slot.to_string(),
        _ => register.address.to_string(),
    }
}

/// 寄存器定位串 `设备名:寄存器名`，用于告警/注释/摘要。
pub fn register_locator(device: &FieldbusDevice, register: &FieldbusRegister) -> String {
    format!("{}:{}", device.name, register.name)
}

pub fn build_io_rows(config: &Configuration, signals: &[ApplicationSignal]) -> IoRowsOutput {
    let index = index_mappings(config);
    let signal_map: HashMap<&str, &ApplicationSignal> =
        signals.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut rows: Vec<IoRow> = Vec::new();
    let mut warnings: Vec<ExportWarning> = Vec::new();
    let mut rendered_mappings: HashSet<Uuid> = HashSet::new();

    for module in sorted_modules(config) {
        for channel in &module.channels {
            let mut row = IoRow {
                index: 0,
                section: RowSection::Hardware,
                location: module.rack_id.clone(),
                slot: module.rack_position.to_string(),
                point: channel.terminal.clone(),
                tag: channel.tag.clone(),
                signal_type: Some(channel.signal_type.clone()),
                electrical: channel.electrical_type.clone(),
                status: RowStatus::Unmapped,
                component_name: String::new(),
                signal_name: String::new(),
                app_signal_type: None,
                app_data_type: String::new(),
                scaling: None,
                grounded: false,
                ground_value: String::new(),
                notes: String::new(),
                channel_id: Some(channel.id),
                register_id: None,
                mapping_id: None,
                signal_id: None,
            };
            if let Some(mapping) = index.by_channel.get(&channel.id) {
                apply_mapping(
                    &mut row,
                    mapping,
                    &signal_map,
                    &channel.terminal,
                    &mut warnings,
                );
                rendered_mappings.insert(mapping.id);
            }
            rows.push(row);
        }
    }

    for device in &config.devices {
        for register in &device.registers {
            let locator = register_locator(device, register);
            let mut row = IoRow {
                index: 0,
                section: RowSection::Fieldbus,
                location: device.name.clone(),
                slot: register_address_display(register),
                point: register.name.clone(),
                tag: String::new(),
                signal_type: Some(register.signal_type.clone()),
                electrical: device.protocol.as_str().to_string(),
                status: RowStatus::Unmapped,
                component_name: String::new(),
                signal_name: String::new(),
                app_signal_type: None,
                app_data_type: String::new(),
                scaling: None,
                grounded: false,
                ground_value: String::new(),
                notes: String::new(),
                channel_id: None,
                register_id: Some(register.id),
                mapping_id: None,
                signal_id: None,
            };
            if let Some(mapping) = index.by_register.get(&register.id) {
                apply_mapping(&mut row, mapping, &signal_map, &locator, &mut warnings);
                rendered_mappings.insert(mapping.id);
            }
            rows.push(row);
        }
    }

    // 尾部虚拟行：接地信号、未映射信号、以及源已失效/被占用的绑定信号。
    for signal in signals {
        let mapping = index.by_signal.get(signal.id.as_str()).copied();
        let row = match mapping {
            None => virtual_row(signal, RowStatus::Unmapped, None, String::new(), String::new()),
            Some(m) if m.grounded => {
                let value = m.ground_value.clone().unwrap_or_default();
                virtual_row(signal, RowStatus::Grounded, Some(m), value, String::new())
            }
            Some(m) => {
                if rendered_mappings.contains(&m.id) {
                    continue;
                }
                if source_exists(config, m) {
                    warnings.push(ExportWarning {
                        code: "MAPPING_SOURCE_DUPLICATE".to_string(),
                        message: format!(
                            "signal {} is bound to a source already bound by an earlier mapping",
                            signal.signal_path()
                        ),
                        mapping_id: Some(m.id),
                        point: None,
                        signal_id: Some(signal.id.clone()),
                    });
                    let mut row = virtual_row(
                        signal,
                        RowStatus::Mapped,
                        Some(m),
                        String::new(),
                        "duplicate source binding".to_string(),
                    );
                    row.scaling = m.scaling.clone();
                    row
                } else {
                    warnings.push(ExportWarning {
                        code: "MAPPING_SOURCE_MISSING".to_string(),
                        message: format!(
                            "signal {} is bound to a source missing from the inventory",
                            signal.signal_path()
                        ),
                        mapping_id: Some(m.id),
                        point: None,
                        signal_id: Some(signal.id.clone()),
                    });
                    virtual_row(
                        signal,
                        RowStatus::Unmapped,
                        Some(m),
                        String::new(),
                        "mapped source missing from inventory".to_string(),
                    )
                }
            }
        };
        rows.push(row);
    }

    for (n, row) in rows.iter_mut().enumerate() {
        row.index = (n + 1) as u32;
    }

    IoRowsOutput { rows, warnings }
}

fn apply_mapping(
    row: &mut IoRow,
    mapping: &Mapping,
    signal_map: &HashMap<&str, &ApplicationSignal>,
    locator: &str,
    warnings: &mut Vec<ExportWarning>,
) {
    row.status = RowStatus::Mapped;
    row.mapping_id = Some(mapping.id);
    row.scaling = mapping.scaling.clone();
    row.signal_id = Some(mapping.application_signal_id.clone());
    match signal_map.get(mapping.application_signal_id.as_str()) {
        Some(signal) => {
            row.component_name = signal.component_name.clone();
            row.signal_name = signal.signal_name.clone();
            row.app_signal_type = Some(signal.signal_type.clone());
            row.app_data_type = signal.data_type.clone().unwrap_or_default();
        }
        None => {
            row.signal_name = mapping.application_signal_id.clone();
            row.notes = "signal not in catalog".to_string();
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
}

fn virtual_row(
    signal: &ApplicationSignal,
    status: RowStatus,
    mapping: Option<&Mapping>,
    ground_value: String,
    notes: String,
) -> IoRow {
    IoRow {
        index: 0,
        section: RowSection::Virtual,
        location: String::new(),
        slot: String::new(),
        point: String::new(),
        tag: String::new(),
        signal_type: None,
        electrical: String::new(),
        grounded: matches!(status, RowStatus::Grounded),
        status,
        component_name: signal.component_name.clone(),
        signal_name: signal.signal_name.clone(),
        app_signal_type: Some(signal.signal_type.clone()),
        app_data_type: signal.data_type.clone().unwrap_or_default(),
        scaling: None,
        ground_value,
        notes,
        channel_id: None,
        register_id: None,
        mapping_id: mapping.map(|m| m.id),
        signal_id: Some(signal.id.clone()),
    }
}

fn source_exists(config: &Configuration, mapping: &Mapping) -> bool {
    if let Some(channel_id) = mapping.source_channel_id() {
        return config.find_channel(channel_id).is_some();
    }
    if let Some(register_id) = mapping.source_register_id() {
        return config.find_register(register_id).is_some();
    }
    false
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub mapped: u32,
    pub grounded: u32,
    pub unmapped: u32,
}

impl StatusCounts {
    pub fn total(&self) -> u32 {
        self.mapped + self.grounded + self.unmapped
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSummaryEntry {
    pub label: &'static str,
    pub counts: StatusCounts,
}

/// 按信号类型 × 状态计数；虚拟行按其应用信号类型归类。
pub fn summarize_by_type(rows: &[IoRow]) -> Vec<TypeSummaryEntry> {
    let mut di_counts = StatusCounts::default();
    let mut do_counts = StatusCounts::default();
    let mut ai_counts = StatusCounts::default();
    let mut ao_counts = StatusCounts::default();

    for row in rows {
        let effective = row.signal_type.as_ref().or(row.app_signal_type.as_ref());
        let counts = match effective {
            Some(SignalType::DI) => &mut di_counts,
            Some(SignalType::DO) => &mut do_counts,
            Some(SignalType::AI) => &mut ai_counts,
            Some(SignalType::AO) => &mut ao_counts,
            None => continue,
        };
        match row.status {
            RowStatus::Mapped => counts.mapped += 1,
            RowStatus::Grounded => counts.grounded += 1,
            RowStatus::Unmapped => counts.unmapped += 1,
        }
    }

    vec![
        TypeSummaryEntry { label: "DI", counts: di_counts },
        TypeSummaryEntry { label: "DO", counts: do_counts },
        TypeSummaryEntry { label: "AI", counts: ai_counts },
        TypeSummaryEntry { label: "AO", counts: ao_counts },
    ]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleSummaryEntry {
    pub rack_id: String,
    pub rack_position: u32,
    pub model: String,
    pub name: String,
    pub channels: u32,
    pub mapped: u32,
}

pub fn summarize_modules(config: &Configuration) -> Vec<ModuleSummaryEntry> {
    let index = index_mappings(config);
    sorted_modules(config)
        .into_iter()
        .map(|module| ModuleSummaryEntry {
            rack_id: module.rack_id.clone(),
            rack_position: module.rack_position,
            model: module.model.clone(),
            name: module.name.clone(),
            channels: module.channels.len() as u32,
            mapped: module
                .channels
                .iter()
                .filter(|c| index.by_channel.contains_key(&c.id))
                .count() as u32,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceSummaryEntry {
    pub name: String,
    pub model: String,
    pub protocol: String,
    pub ip_address: String,
    pub registers: u32,
    pub mapped: u32,
}

pub fn summarize_devices(config: &Configuration) -> Vec<DeviceSummaryEntry> {
    let index = index_mappings(config);
    config
        .devices
        .iter()
        .map(|device| DeviceSummaryEntry {
            name: device.name.clone(),
            model: device.model.clone(),
            protocol: device.protocol.as_str().to_string(),
            ip_address: device.ip_address.clone(),
            registers: device.registers.len() as u32,
            mapped: device
                .registers
                .iter()
                .filter(|r| index.by_register.contains_key(&r.id))
                .count() as u32,
        })
        .collect()
}
