//! 平面 I/O 表导出（冻结规范 v1）。
//!
//! 约束：
//! - 21 列列名与顺序逐字冻结，任何新增信息不得通过改列实现。
//! - 一行 = 一个物理点；无物理源的应用信号行排在最后。
//! - 空白显示列渲染占位符；tag 与 notes 列原样输出。
//! - 行结束符固定 `\n`，嵌入分隔符/引号/换行按 RFC 4180 方式转义。

use std::time::Instant;

use crate::core::model::{ApplicationSignal, Configuration, ExportWarning};
use crate::core::rows::{build_io_rows, IoRow, RowSection};
use crate::usecase::export::{elapsed_ms, ExportDiagnostics, PLACEHOLDER};

pub const IO_CSV_HEADERS_V1: [&str; 21] = [
    "Index",
    "Source",
    "Rack/Device",
    "Slot/Address",
    "Terminal/Register",
    "Tag",
    "HW Type",
    "Electrical/Protocol",
    "Status",
    "App Component",
    "App Signal",
    "App Type",
    "App Data Type",
    "Raw Range",
    "Eng Range",
    "Unit",
    "Clamp",
    "Filter ms",
    "Grounded",
    "Ground Value",
    "Notes",
];

#[derive(Clone, Debug, PartialEq)]
pub struct ExportCsvOutcome {
    pub csv: String,
    pub headers: Vec<String>,
    pub warnings: Vec<ExportWarning>,
    pub diagnostics: ExportDiagnostics,
}

pub fn export_io_csv(config: &Configuration, signals: &[ApplicationSignal]) -> ExportCsvOutcome {
    let started = Instant::now();
    let output = build_io_rows(config, signals);

    let mut csv = String::new();
    let header_line: Vec<String> = IO_CSV_HEADERS_V1
        .iter()
        .map(|h| escape_csv(h))
        .collect();
    csv.push_str(&header_line.join(","));
    csv.push('\n');

    for row in &output.rows {
        let cells = row_cells(row);
        let escaped: Vec<String> = cells.iter().map(|c| escape_csv(c)).collect();
        csv.push_str(&escaped.join(","));
        csv.push('\n');
    }

    ExportCsvOutcome {
        csv,
        headers: IO_CSV_HEADERS_V1.iter().map(|s| (*s).to_string()).collect(),
        warnings: output.warnings,
        diagnostics: ExportDiagnostics {
            exported_rows: output.rows.len().min(u32::MAX as usize) as u32,
            duration_ms: elapsed_ms(started),
        },
    }
}

fn or_placeholder(value: &str) -> String {
    if value.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

/// 同一行文本渲染供 CSV / 工作簿 / HTML 三个出口共用。
pub(crate) fn row_cells(row: &IoRow) -> [String; 21] {
    let source = match row.section {
        RowSection::Hardware => "HW".to_string(),
        RowSection::Fieldbus => "COM".to_string(),
        RowSection::Virtual => PLACEHOLDER.to_string(),
    };
    let hw_type = row
        .signal_type
        .as_ref()
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let app_type = row
        .app_signal_type
        .as_ref()
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let (raw_range, eng_range, unit, clamp, filter_ms) = match &row.scaling {
        Some(s) => (
            format!("{}..{}", s.raw_min, s.raw_max),
            format!("{}..{}", s.eng_min, s.eng_max),
            or_placeholder(&s.unit),
            if s.clamp_enabled { "true" } else { "false" }.to_string(),
            s.filter_ms.to_string(),
        ),
        None => (
            PLACEHOLDER.to_string(),
            PLACEHOLDER.to_string(),
            PLACEHOLDER.to_string(),
            PLACEHOLDER.to_string(),
            PLACEHOLDER.to_string(),
        ),
    };

    [
        row.index.to_string(),
        source,
        or_placeholder(&row.location),
        or_placeholder(&row.slot),
        or_placeholder(&row.point),
        row.tag.clone(),
        hw_type,
        or_placeholder(&row.electrical),
        row.status.as_str().to_string(),
        or_placeholder(&row.component_name),
        or_placeholder(&row.signal_name),
        app_type,
        or_placeholder(&row.app_data_type),
        raw_range,
        eng_range,
        unit,
        clamp,
        filter_ms,
        if row.grounded { "true" } else { "false" }.to_string(),
        or_placeholder(&row.ground_value),
        row.notes.clone(),
    ]
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
