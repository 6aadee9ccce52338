//! 自包含 HTML 版 I/O 报告（单文件、内联样式，便于归档与邮件分发）。
//!
//! 约束：
//! - 输出为纯字符串拼接，无外部资源引用。
//! - 文本单元格一律经 HTML 转义；徽标文案来自枚举常量，不转义。
//! - 配色与工作簿共用同一组常量。

use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::model::{ApplicationSignal, Configuration, ExportWarning, SignalType};
use crate::core::rows::{
    build_io_rows, summarize_by_type, summarize_devices, summarize_modules, IoRow, RowStatus,
};
use crate::usecase::export::export_io_csv::{row_cells, IO_CSV_HEADERS_V1};
use crate::usecase::export::export_workbook::{
    COM_DEVICES_HEADERS, HW_MODULES_HEADERS, SUMMARY_HEADERS,
};
use crate::usecase::export::{
    elapsed_ms, section_group_key, section_label, ExportDiagnostics, COLOR_AI, COLOR_AO, COLOR_DI,
    COLOR_DO, COLOR_GROUNDED, COLOR_MAPPED, COLOR_UNMAPPED, GENERATOR_TAG,
};

/// 基础样式；徽标配色规则在 [`render_css`] 里由常量生成后追加。
pub const DEFAULT_CSS: &str = "\
body { font-family: \"Segoe UI\", Arial, sans-serif; margin: 24px; color: #1f2933; }
h1 { font-size: 20px; margin-bottom: 4px; }
h2 { font-size: 15px; margin-top: 28px; border-bottom: 1px solid #d0d7de; padding-bottom: 4px; }
table { border-collapse: collapse; font-size: 12px; }
th, td { border: 1px solid #d0d7de; padding: 3px 8px; text-align: left; }
th { background: #f0f3f6; }
table.meta td { border: none; padding: 2px 12px 2px 0; }
table.meta td.label { font-weight: 600; }
tr.section td { background: #d9d9d9; font-weight: 600; }
.badge { display: inline-block; padding: 1px 6px; border-radius: 3px; font-weight: 600; }
footer { margin-top: 32px; font-size: 11px; color: #6b7280; }
@media print {
  body { margin: 8mm; }
  h2 { page-break-after: avoid; }
  table { page-break-inside: auto; }
  tr { page-break-inside: avoid; }
}
";

#[derive(Clone, Debug)]
pub struct ExportHtmlOutcome {
    pub html: String,
    pub warnings: Vec<ExportWarning>,
    pub diagnostics: ExportDiagnostics,
}

pub fn export_report_html(
    config: &Configuration,
    signals: &[ApplicationSignal],
    generated_at_utc: DateTime<Utc>,
) -> ExportHtmlOutcome {
    let started = Instant::now();
    let output = build_io_rows(config, signals);

    let mut html = String::with_capacity(16 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>{} I/O Mapping Report</title>\n",
        escape_html(&config.project_name)
    ));
    html.push_str("<style>\n");
    html.push_str(&render_css());
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str("<h1>I/O Mapping Report</h1>\n");

    push_meta_table(&mut html, config, signals, &output.rows, generated_at_utc);
    push_summary_table(&mut html, &output.rows);
    push_io_table(&mut html, &output.rows);
    push_module_table(&mut html, config);
    if !config.devices.is_empty() {
        push_device_table(&mut html, config);
    }

    html.push_str(&format!(
        "<footer>Generated {} by {}</footer>\n",
        generated_at_utc.to_rfc3339_opts(SecondsFormat::Secs, true),
        GENERATOR_TAG
    ));
    html.push_str("</body>\n</html>\n");

    ExportHtmlOutcome {
        html,
        warnings: output.warnings,
        diagnostics: ExportDiagnostics {
            exported_rows: output.rows.len().min(u32::MAX as usize) as u32,
            duration_ms: elapsed_ms(started),
        },
    }
}

fn render_css() -> String {
    let mut css = String::from(DEFAULT_CSS);
    for (class, (fill, font)) in [
        ("badge-di", COLOR_DI),
        ("badge-do", COLOR_DO),
        ("badge-ai", COLOR_AI),
        ("badge-ao", COLOR_AO),
        ("status-mapped", COLOR_MAPPED),
        ("status-grounded", COLOR_GROUNDED),
        ("status-unmapped", COLOR_UNMAPPED),
    ] {
        css.push_str(&format!(
            ".{class} {{ background: #{fill:06X}; color: #{font:06X}; }}\n"
        ));
    }
    css
}

fn type_badge_class(signal_type: &SignalType) -> &'static str {
    match signal_type {
        SignalType::DI => "badge-di",
        SignalType::DO => "badge-do",
        SignalType::AI => "badge-ai",
        SignalType::AO => "badge-ao",
    }
}

fn status_badge_class(status: &RowStatus) -> &'static str {
    match status {
        RowStatus::Mapped => "status-mapped",
        RowStatus::Grounded => "status-grounded",
        RowStatus::Unmapped => "status-unmapped",
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn push_meta_table(
    html: &mut String,
    config: &Configuration,
    signals: &[ApplicationSignal],
    rows: &[IoRow],
    generated_at_utc: DateTime<Utc>,
) {
    let entries: [(&str, String); 8] = [
        ("Project", config.project_name.clone()),
        ("Configuration version", config.version.to_string()),
        (
            "Generated (UTC)",
            generated_at_utc.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("Generator", GENERATOR_TAG.to_string()),
        ("Hardware modules", config.modules.len().to_string()),
        ("Fieldbus devices", config.devices.len().to_string()),
        ("Application signals", signals.len().to_string()),
        ("I/O rows", rows.len().to_string()),
    ];
    html.push_str("<table class=\"meta\">\n");
    for (label, value) in entries {
        html.push_str(&format!(
            "<tr><td class=\"label\">{}</td><td>{}</td></tr>\n",
            escape_html(label),
            escape_html(&value)
        ));
    }
    html.push_str("</table>\n");
}

fn push_summary_table(html: &mut String, rows: &[IoRow]) {
    html.push_str("<h2>Signal Summary</h2>\n<table>\n<thead><tr>");
    for header in SUMMARY_HEADERS {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    let mut total_mapped: u32 = 0;
    let mut total_grounded: u32 = 0;
    let mut total_unmapped: u32 = 0;
    for entry in summarize_by_type(rows) {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            entry.label,
            entry.counts.mapped,
            entry.counts.grounded,
            entry.counts.unmapped,
            entry.counts.total()
        ));
        total_mapped += entry.counts.mapped;
        total_grounded += entry.counts.grounded;
        total_unmapped += entry.counts.unmapped;
    }
    html.push_str(&format!(
        "<tr><td><strong>TOTAL</strong></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        total_mapped,
        total_grounded,
        total_unmapped,
        total_mapped + total_grounded + total_unmapped
    ));
    html.push_str("</tbody>\n</table>\n");
}

fn push_io_table(html: &mut String, rows: &[IoRow]) {
    html.push_str("<h2>I/O List</h2>\n<table class=\"io\">\n<thead><tr>");
    for header in IO_CSV_HEADERS_V1 {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    let col_count = IO_CSV_HEADERS_V1.len();
    let mut last_group: Option<String> = None;
    for row in rows {
        let group_key = section_group_key(row);
        if last_group.as_deref() != Some(group_key.as_str()) {
            html.push_str(&format!(
                "<tr class=\"section\"><td colspan=\"{col_count}\">{}</td></tr>\n",
                escape_html(&section_label(row))
            ));
            last_group = Some(group_key);
        }

        let cells = row_cells(row);
        let effective_type = row.signal_type.as_ref().or(row.app_signal_type.as_ref());
        let type_col: usize = if row.signal_type.is_some() { 6 } else { 11 };

        html.push_str("<tr>");
        for (col, cell) in cells.iter().enumerate() {
            match (col, effective_type) {
                (c, Some(signal_type)) if c == type_col => {
                    html.push_str(&format!(
                        "<td><span class=\"badge {}\">{}</span></td>",
                        type_badge_class(signal_type),
                        signal_type.as_str()
                    ));
                }
                (8, _) => {
                    html.push_str(&format!(
                        "<td><span class=\"badge {}\">{}</span></td>",
                        status_badge_class(&row.status),
                        row.status.as_str()
                    ));
                }
                _ => html.push_str(&format!("<td>{}</td>", escape_html(cell))),
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
}

fn push_module_table(html: &mut String, config: &Configuration) {
    html.push_str("<h2>Hardware Modules</h2>\n<table>\n<thead><tr>");
    for header in HW_MODULES_HEADERS {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for entry in summarize_modules(config) {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&entry.rack_id),
            entry.rack_position,
            escape_html(&entry.model),
            escape_html(&entry.name),
            entry.channels,
            entry.mapped
        ));
    }
    html.push_str("</tbody>\n</table>\n");
}

fn push_device_table(html: &mut String, config: &Configuration) {
    html.push_str("<h2>Fieldbus Devices</h2>\n<table>\n<thead><tr>");
    for header in COM_DEVICES_HEADERS {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for entry in summarize_devices(config) {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&entry.name),
            escape_html(&entry.model),
            escape_html(&entry.protocol),
            escape_html(&entry.ip_address),
            entry.registers,
            entry.mapped
        ));
    }
    html.push_str("</tbody>\n</table>\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use uuid::Uuid;

    use crate::core::model::{
        ByteOrder32, FieldbusDevice, FieldbusProtocol, FieldbusRegister, HardwareChannel,
        HardwareModule, Mapping, MappingSource, MappingStatus, RegisterDataType, SignalScaling,
    };

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    fn demo_config() -> (Configuration, Vec<ApplicationSignal>) {
        let mut config = Configuration::new("DEMO");
        config.modules = vec![HardwareModule {
            id: Uuid::from_u128(10),
            rack_id: "X100".to_string(),
            rack_position: 1,
            model: "AI8-16B".to_string(),
            name: "Analog In".to_string(),
            channels: vec![HardwareChannel {
                id: Uuid::from_u128(11),
                module_id: Uuid::from_u128(10),
                index: 0,
                signal_type: SignalType::AI,
                electrical_type: "4-20mA".to_string(),
                terminal: "X100:1.1".to_string(),
                tag: "FT-1001 <raw> & \"loop\"".to_string(),
            }],
        }];
        config.devices = vec![FieldbusDevice {
            id: Uuid::from_u128(40),
            model: "GEN-CTRL".to_string(),
            name: "GEN-01".to_string(),
            protocol: FieldbusProtocol::ModbusTcp,
            ip_address: "192.168.0.10".to_string(),
            port: 502,
            unit_id: 1,
            poll_rate_ms: 500,
            registers: vec![FieldbusRegister {
                id: Uuid::from_u128(41),
                device_id: Uuid::from_u128(40),
                name: "Speed_Ref".to_string(),
                signal_type: SignalType::AO,
                data_type: RegisterDataType::UInt16,
                address: 100,
                slot: None,
                subslot: None,
                byte_order: ByteOrder32::ABCD,
                scale_factor: 1.0,
            }],
        }];
        config.mappings = vec![Mapping {
            id: Uuid::from_u128(20),
            source: Some(MappingSource::Hw {
                channel_id: Uuid::from_u128(11),
            }),
            application_signal_id: "sig-fb".to_string(),
            scaling: Some(SignalScaling::default_current_loop()),
            grounded: false,
            ground_value: None,
            status: MappingStatus::Mapped,
        }];
        let signals = vec![
            ApplicationSignal {
                id: "sig-fb".to_string(),
                component_name: "PumpC_01".to_string(),
                signal_name: "Speed_Feedback".to_string(),
                signal_type: SignalType::AI,
                data_type: Some("REAL".to_string()),
                required: true,
            },
            ApplicationSignal {
                id: "sig-en".to_string(),
                component_name: "PumpC_01".to_string(),
                signal_name: "Enable".to_string(),
                signal_type: SignalType::DI,
                data_type: None,
                required: true,
            },
        ];
        (config, signals)
    }

    #[test]
    fn report_renders_sections_and_badges() {
        let (config, signals) = demo_config();
        let outcome = export_report_html(&config, &signals, timestamp());

        assert!(outcome.html.starts_with("<!DOCTYPE html>"));
        assert!(outcome.html.contains("<title>DEMO I/O Mapping Report</title>"));
        assert!(outcome.html.contains("Rack X100"));
        assert!(outcome.html.contains("Device GEN-01 (TCP)"));
        assert!(outcome.html.contains("Unmapped / grounded signals"));
        assert!(outcome
            .html
            .contains("<span class=\"badge badge-ai\">AI</span>"));
        assert!(outcome
            .html
            .contains("<span class=\"badge status-mapped\">mapped</span>"));
        assert!(outcome
            .html
            .contains("<span class=\"badge status-unmapped\">unmapped</span>"));
        assert!(outcome
            .html
            .contains(".badge-ai { background: #E2EFDA; color: #375623; }"));
        assert!(outcome.html.contains("Generated 2026-01-02T03:04:05Z"));
        assert_eq!(outcome.diagnostics.exported_rows, 3);
    }

    #[test]
    fn cell_text_is_html_escaped() {
        let (config, signals) = demo_config();
        let outcome = export_report_html(&config, &signals, timestamp());

        assert!(outcome
            .html
            .contains("FT-1001 &lt;raw&gt; &amp; &quot;loop&quot;"));
        assert!(!outcome.html.contains("FT-1001 <raw>"));
    }

    #[test]
    fn device_table_only_when_devices_exist() {
        let (mut config, signals) = demo_config();
        let with = export_report_html(&config, &signals, timestamp());
        assert!(with.html.contains("<h2>Fieldbus Devices</h2>"));

        config.devices.clear();
        let without = export_report_html(&config, &signals, timestamp());
        assert!(!without.html.contains("<h2>Fieldbus Devices</h2>"));
    }

    #[test]
    fn same_timestamp_is_deterministic() {
        let (config, signals) = demo_config();
        let first = export_report_html(&config, &signals, timestamp());
        let second = export_report_html(&config, &signals, timestamp());
        assert_eq!(first.html, second.html);
    }
}
