//! IEC-61131-3 全局变量表导出。
//!
//! 约束：
//! - 一个已绑定/接地的应用信号 = 一条声明；未映射信号不出现。
//! - 三组注释分隔：硬件 I/O、总线 I/O、接地常量，空组省略。
//! - 变量名 `<组件>_<信号>`：非字母数字折叠为单个下划线，数字开头补前导下划线。
//! - 同名冲突按出现顺序追加 `_2`/`_3` 并产出 VAR_NAME_COLLISION 告警。
//! - 输出不含时钟字段，天然可复现。

use std::collections::HashSet;
use std::time::Instant;

use crate::core::model::{
    ApplicationSignal, Configuration, ExportWarning, MappingSource, SignalType,
};
use crate::core::rows::{build_io_rows, register_locator, IoRow, RowSection, RowStatus};
use crate::usecase::export::{elapsed_ms, ExportDiagnostics};

/// toIECType 认可的原语名（大写规范形）。
pub const IEC_PRIMITIVES: [&str; 10] = [
    "BOOL", "BYTE", "WORD", "DWORD", "INT", "DINT", "UINT", "UDINT", "REAL", "LREAL",
];

pub const HARDWARE_GROUP_HEADER: &str = "(* Hardware I/O *)";
pub const FIELDBUS_GROUP_HEADER: &str = "(* Fieldbus I/O *)";
pub const GROUNDED_GROUP_HEADER: &str = "(* Grounded constants *)";

#[derive(Clone, Debug, PartialEq)]
pub struct ExportVarListOutcome {
    pub text: String,
    pub warnings: Vec<ExportWarning>,
    pub diagnostics: ExportDiagnostics,
}

/// 显式 dataType 命中原语名优先；否则模拟量或带换算 → REAL；否则 BOOL。
pub fn to_iec_type(
    signal_type: &SignalType,
    data_type: Option<&str>,
    has_scaling: bool,
) -> &'static str {
    if let Some(raw) = data_type {
        let upper = raw.trim().to_ascii_uppercase();
        if let Some(primitive) = IEC_PRIMITIVES.iter().find(|p| **p == upper) {
            return primitive;
        }
    }
    if signal_type.is_analog() || has_scaling {
        "REAL"
    } else {
        "BOOL"
    }
}

/// 非字母数字折叠为单个 `_`；数字开头补 `_` 前缀。
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c);
        } else {
            pending_separator = true;
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

struct Declaration {
    name: String,
    iec_type: &'static str,
    default: Option<String>,
    locator: String,
}

impl Declaration {
    fn render(&self) -> String {
        match &self.default {
            Some(value) => format!(
                "    {} : {} := {}; (* {} *)",
                self.name, self.iec_type, value, self.locator
            ),
            None => format!("    {} : {}; (* {} *)", self.name, self.iec_type, self.locator),
        }
    }
}

pub fn export_var_list(
    config: &Configuration,
    signals: &[ApplicationSignal],
) -> ExportVarListOutcome {
    let started = Instant::now();
    log::debug!("serializing var list: project {}", config.project_name);
    let output = build_io_rows(config, signals);
    let catalog: HashSet<&str> = signals.iter().map(|s| s.id.as_str()).collect();

    let mut warnings = output.warnings.clone();
    let mut used_names: HashSet<String> = HashSet::new();
    let mut hardware: Vec<Declaration> = Vec::new();
    let mut fieldbus: Vec<Declaration> = Vec::new();
    let mut grounded: Vec<Declaration> = Vec::new();

    for row in &output.rows {
        let resolved = row
            .signal_id
            .as_deref()
            .is_some_and(|id| catalog.contains(id));
        if !resolved {
            continue;
        }

        let (group, locator) = match (&row.section, &row.status) {
            (RowSection::Hardware, RowStatus::Mapped) => (Group::Hardware, row.point.clone()),
            (RowSection::Fieldbus, RowStatus::Mapped) => {
                (Group::Fieldbus, format!("{}:{}", row.location, row.point))
            }
            (RowSection::Virtual, RowStatus::Grounded) => {
                (Group::Grounded, "grounded".to_string())
            }
            (RowSection::Virtual, RowStatus::Mapped) => match duplicate_source_locator(config, row)
            {
                Some(pair) => pair,
                None => continue,
            },
            _ => continue,
        };

        let base = sanitize_identifier(&format!("{}_{}", row.component_name, row.signal_name));
        let (name, collided) = unique_name(base, &mut used_names);
        if collided {
            warnings.push(ExportWarning {
                code: "VAR_NAME_COLLISION".to_string(),
                message: format!("variable name collided, renamed to '{name}'"),
                mapping_id: row.mapping_id,
                point: None,
                signal_id: row.signal_id.clone(),
            });
        }

        let signal_type = match row.app_signal_type.as_ref().or(row.signal_type.as_ref()) {
            Some(t) => t,
            None => continue,
        };
        let data_type = if row.app_data_type.is_empty() {
            None
        } else {
            Some(row.app_data_type.as_str())
        };
        let declaration = Declaration {
            name,
            iec_type: to_iec_type(signal_type, data_type, row.scaling.is_some()),
            default: if row.grounded {
                Some(row.ground_value.clone())
            } else {
                None
            },
            locator,
        };
        match group {
            Group::Hardware => hardware.push(declaration),
            Group::Fieldbus => fieldbus.push(declaration),
            Group::Grounded => grounded.push(declaration),
        }
    }

    let declaration_count = hardware.len() + fieldbus.len() + grounded.len();
    let mut text = String::from("VAR_GLOBAL\n");
    let mut first_group = true;
    for (header, group) in [
        (HARDWARE_GROUP_HEADER, &hardware),
        (FIELDBUS_GROUP_HEADER, &fieldbus),
        (GROUNDED_GROUP_HEADER, &grounded),
    ] {
        if group.is_empty() {
            continue;
        }
        if !first_group {
            text.push('\n');
        }
        first_group = false;
        text.push_str("    ");
        text.push_str(header);
        text.push('\n');
        for declaration in group {
            text.push_str(&declaration.render());
            text.push('\n');
        }
    }
    text.push_str("END_VAR\n");

    ExportVarListOutcome {
        text,
        warnings,
        diagnostics: ExportDiagnostics {
            exported_rows: declaration_count.min(u32::MAX as usize) as u32,
            duration_ms: elapsed_ms(started),
        },
    }
}

enum Group {
    Hardware,
    Fieldbus,
    Grounded,
}

/// 重复源绑定的虚拟行：从配置反查映射源，归入对应分组。
fn duplicate_source_locator(config: &Configuration, row: &IoRow) -> Option<(Group, String)> {
    let mapping_id = row.mapping_id?;
    let mapping = config.mappings.iter().find(|m| m.id == mapping_id)?;
    match mapping.source.as_ref()? {
        MappingSource::Hw { channel_id } => {
            let (_, channel) = config.find_channel(*channel_id)?;
            Some((Group::Hardware, channel.terminal.clone()))
        }
        MappingSource::Com { register_id } => {
            let (device, register) = config.find_register(*register_id)?;
            Some((Group::Fieldbus, register_locator(device, register)))
        }
    }
}

fn unique_name(base: String, used: &mut HashSet<String>) -> (String, bool) {
    if used.insert(base.clone()) {
        return (base, false);
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if used.insert(candidate.clone()) {
            return (candidate, true);
        }
        n += 1;
    }
}
