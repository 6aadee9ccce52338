//! 信号映射引擎：稳定数据模型与 DTO。
//!
//! 约束：
//! - 持久化 JSON 顶层必须包含 `schemaVersion: 1`
//! - 实体主键为运行期稳定的 `id`（UUID）；业务键（tag/name）可编辑但不作关联键
//! - `Mapping.source` 为 `None` 当且仅当 `grounded=true`（接地映射无物理源）
//! - "未映射" 不是存储状态：它是派生视图（实体不被任何 Mapping 引用）

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MappingError;

pub const SCHEMA_VERSION_V1: u32 = 1;

fn default_scale_factor() -> f64 {
    1.0
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalType {
    DI,
    DO,
    AI,
    AO,
}

impl SignalType {
    pub fn is_analog(&self) -> bool {
        matches!(self, SignalType::AI | SignalType::AO)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::DI => "DI",
            SignalType::DO => "DO",
            SignalType::AI => "AI",
            SignalType::AO => "AO",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RegisterDataType {
    Bool,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    #[serde(other)]
    Unknown,
}

impl RegisterDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterDataType::Bool => "Bool",
            RegisterDataType::Int16 => "Int16",
            RegisterDataType::UInt16 => "UInt16",
            RegisterDataType::Int32 => "Int32",
            RegisterDataType::UInt32 => "UInt32",
            RegisterDataType::Float32 => "Float32",
            RegisterDataType::Unknown => "",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ByteOrder32 {
    ABCD,
    BADC,
    CDAB,
    DCBA,
    #[serde(other)]
    Unknown,
}

impl ByteOrder32 {
    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder32::ABCD => "ABCD",
            ByteOrder32::BADC => "BADC",
            ByteOrder32::CDAB => "CDAB",
            ByteOrder32::DCBA => "DCBA",
            ByteOrder32::Unknown => "",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FieldbusProtocol {
    /// `protocol: "TCP"`
    #[serde(rename = "TCP")]
    ModbusTcp,
    /// `protocol: "RTU"`
    #[serde(rename = "RTU")]
    ModbusRtu,
    /// `protocol: "PROFINET"`
    #[serde(rename = "PROFINET")]
    ProfinetIo,
    #[serde(other)]
    Unknown,
}

impl FieldbusProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldbusProtocol::ModbusTcp => "TCP",
            FieldbusProtocol::ModbusRtu => "RTU",
            FieldbusProtocol::ProfinetIo => "PROFINET",
            FieldbusProtocol::Unknown => "",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MappingStatus {
    Mapped,
    Grounded,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IssueCategory {
    TypeMismatch,
    UnmappedRequired,
    UnmappedHw,
    UnmappedCom,
    Duplicate,
    Scaling,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HardwareChannel {
    pub id: Uuid,
    pub module_id: Uuid,
    /// 模块内通道序号（内部 0-based）。
    pub index: u32,
    pub signal_type: SignalType,
    pub electrical_type: String,
    /// 端子标签 `机架:槽位.通道`（通道对外 1-based），如 `X100:1.3`。
    pub terminal: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HardwareModule {
    pub id: Uuid,
    pub rack_id: String,
    pub rack_position: u32,
    pub model: String,
    pub name: String,
    pub channels: Vec<HardwareChannel>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldbusRegister {
    pub id: Uuid,
    pub device_id: Uuid,
    pub name: String,
    pub signal_type: SignalType,
    pub data_type: RegisterDataType,
    /// 内部 0-based 寄存器/线圈地址。
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
pub struct FieldbusDevice {
    pub id: Uuid,
    pub model: String,
    pub name: String,
    pub protocol: FieldbusProtocol,
    pub ip_address: String,
    pub port: u16,
    pub unit_id: u8,
    pub poll_rate_ms: u32,
    pub registers: Vec<FieldbusRegister>,
}

/// 应用侧信号：由外部组件模型提供，对本核心只读。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSignal {
    pub id: String,
    pub component_name: String,
    pub signal_name: String,
    pub signal_type: SignalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl ApplicationSignal {
    /// 完整信号路径 `Component.Signal`，用于导出与诊断显示。
    pub fn signal_path(&self) -> String {
        format!("{}.{}", self.component_name, self.signal_name)
    }
}

/// 线性 raw→eng 换算参数，仅对 AI/AO 源有意义。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalScaling {
    pub raw_min: f64,
    pub raw_max: f64,
    pub eng_min: f64,
    pub eng_max: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub clamp_enabled: bool,
    #[serde(default)]
    pub filter_ms: u32,
}

impl SignalScaling {
    /// 模拟量绑定默认换算：4..20 mA → 0..100，无单位，开钳位，无滤波。
    pub fn default_current_loop() -> Self {
        Self {
            raw_min: 4.0,
            raw_max: 20.0,
            eng_min: 0.0,
            eng_max: 100.0,
            unit: String::new(),
            clamp_enabled: true,
            filter_ms: 0,
        }
    }

    /// 拒绝零跨度与非有限边界，避免换算阶段产生 NaN/Inf。
    pub fn validate(&self) -> Result<(), MappingError> {
        for (field, value) in [
            ("rawMin", self.raw_min),
            ("rawMax", self.raw_max),
            ("engMin", self.eng_min),
            ("engMax", self.eng_max),
        ] {
            if !value.is_finite() {
                return Err(MappingError::non_finite_scaling(field, format!("{value}")));
            }
        }
        if self.raw_min == self.raw_max {
            return Err(MappingError::degenerate_scaling(
                "rawRange",
                format!("{}..{}", self.raw_min, self.raw_max),
            ));
        }
        if self.eng_min == self.eng_max {
            return Err(MappingError::degenerate_scaling(
                "engRange",
                format!("{}..{}", self.eng_min, self.eng_max),
            ));
        }
        Ok(())
    }

    /// 线性换算；钳位开启时先把 raw 压进原始区间。
    /// 调用方需保证 `validate()` 通过（零跨度在 set_scaling 边界被拒绝）。
    pub fn convert(&self, raw: f64) -> f64 {
        let lo = self.raw_min.min(self.raw_max);
        let hi = self.raw_min.max(self.raw_max);
        let raw = if self.clamp_enabled { raw.clamp(lo, hi) } else { raw };
        let ratio = (raw - self.raw_min) / (self.raw_max - self.raw_min);
        self.eng_min + ratio * (self.eng_max - self.eng_min)
    }
}

/// 物理源引用：硬件通道或总线寄存器，二选一。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "sourceKind", rename_all_fields = "camelCase")]
pub enum MappingSource {
    /// `sourceKind: "hw"`
    #[serde(rename = "hw")]
    Hw { channel_id: Uuid },
    /// `sourceKind: "com"`
    #[serde(rename = "com")]
    Com { register_id: Uuid },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id: Uuid,
    /// 绑定映射必有且仅有一个物理源；接地映射为 `None`。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MappingSource>,
    pub application_signal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<SignalScaling>,
    #[serde(default)]
    pub grounded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_value: Option<String>,
    pub status: MappingStatus,
}

impl Mapping {
    pub fn source_channel_id(&self) -> Option<Uuid> {
        match &self.source {
            Some(MappingSource::Hw { channel_id }) => Some(*channel_id),
            _ => None,
        }
    }

    pub fn source_register_id(&self) -> Option<Uuid> {
        match &self.source {
            Some(MappingSource::Com { register_id }) => Some(*register_id),
            _ => None,
        }
    }

    /// 物理源 id（通道或寄存器），接地映射为 `None`。
    pub fn source_id(&self) -> Option<Uuid> {
        match &self.source {
            Some(MappingSource::Hw { channel_id }) => Some(*channel_id),
            Some(MappingSource::Com { register_id }) => Some(*register_id),
            None => None,
        }
    }
}

/// 聚合根：一个项目一份。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub schema_version: u32,
    #[serde(default)]
    pub project_name: String,
    pub modules: Vec<HardwareModule>,
    pub devices: Vec<FieldbusDevice>,
    pub mappings: Vec<Mapping>,
    /// 快照版本号，由 take_snapshot 递增。
    pub version: u32,
}

impl Configuration {
    pub fn new(project_name: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1,
            project_name: project_name.to_string(),
            modules: Vec::new(),
            devices: Vec::new(),
            mappings: Vec::new(),
            version: 0,
        }
    }

    pub fn find_channel(&self, channel_id: Uuid) -> Option<(&HardwareModule, &HardwareChannel)> {
        for module in &self.modules {
            if let Some(channel) = module.channels.iter().find(|c| c.id == channel_id) {
                return Some((module, channel));
            }
        }
        None
    }

    pub fn find_register(&self, register_id: Uuid) -> Option<(&FieldbusDevice, &FieldbusRegister)> {
        for device in &self.devices {
            if let Some(register) = device.registers.iter().find(|r| r.id == register_id) {
                return Some((device, register));
            }
        }
        None
    }
}

/// 校验结果条目：派生数据，从不持久化。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: IssueSeverity,
    pub category: IssueCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
}

/// 导出降级告警：渲染继续，问题以码值上报。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ExportWarning {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
}
