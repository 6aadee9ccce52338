//! 交付版 I/O 工作簿导出。
//!
//! 约束：
//! - sheet 组成固定：Cover / I/O List / HW Modules / COM Devices（仅当存在
//!   总线设备）/ Summary。
//! - I/O List 冻结表头行并开自动筛选；机架/设备/尾部信号前插入分组行。
//! - 信号类型与状态的配色取自导出层常量，与 HTML 报告一致。

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use crate::core::model::{ApplicationSignal, Configuration, ExportWarning};
use crate::core::rows::{
    build_io_rows, summarize_by_type, summarize_devices, summarize_modules, IoRow,
};
use crate::usecase::export::export_io_csv::{row_cells, IO_CSV_HEADERS_V1};
use crate::usecase::export::{
    elapsed_ms, section_group_key, section_label, signal_type_colors, status_colors,
    ExportDiagnostics, GENERATOR_TAG,
};

pub const COVER_SHEET_NAME: &str = "Cover";
pub const IO_LIST_SHEET_NAME: &str = "I/O List";
pub const HW_MODULES_SHEET_NAME: &str = "HW Modules";
pub const COM_DEVICES_SHEET_NAME: &str = "COM Devices";
pub const SUMMARY_SHEET_NAME: &str = "Summary";

pub const HW_MODULES_HEADERS: [&str; 6] = ["Rack", "Position", "Model", "Name", "Channels", "Mapped"];
pub const COM_DEVICES_HEADERS: [&str; 6] =
    ["Device", "Model", "Protocol", "IP Address", "Registers", "Mapped"];
pub const SUMMARY_HEADERS: [&str; 5] = ["Signal Type", "Mapped", "Grounded", "Unmapped", "Total"];

/// 分组行底色。
const SECTION_FILL: u32 = 0xD9D9D9;

const IO_LIST_COLUMN_WIDTHS: [f64; 21] = [
    6.0, 8.0, 14.0, 11.0, 16.0, 14.0, 8.0, 16.0, 10.0, 18.0, 20.0, 9.0, 13.0, 10.0, 10.0, 8.0,
    7.0, 9.0, 9.0, 12.0, 28.0,
];

#[derive(Debug, Error)]
pub enum ExportWorkbookError {
    #[error("xlsx error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct ExportWorkbookOutcome {
    pub headers: Vec<String>,
    pub warnings: Vec<ExportWarning>,
    pub diagnostics: ExportDiagnostics,
}

pub fn export_workbook(
    out_path: &Path,
    config: &Configuration,
    signals: &[ApplicationSignal],
    generated_at_utc: DateTime<Utc>,
) -> Result<ExportWorkbookOutcome, ExportWorkbookError> {
    let started = Instant::now();
    let output = build_io_rows(config, signals);

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    write_cover_sheet(&mut workbook, config, signals, &output.rows, generated_at_utc)?;
    write_io_list_sheet(&mut workbook, &output.rows, &header_format)?;
    write_modules_sheet(&mut workbook, config, &header_format)?;
    if !config.devices.is_empty() {
        write_devices_sheet(&mut workbook, config, &header_format)?;
    }
    write_summary_sheet(&mut workbook, &output.rows, &header_format)?;

    workbook.save(out_path)?;

    Ok(ExportWorkbookOutcome {
        headers: IO_CSV_HEADERS_V1.iter().map(|s| (*s).to_string()).collect(),
        warnings: output.warnings,
        diagnostics: ExportDiagnostics {
            exported_rows: output.rows.len().min(u32::MAX as usize) as u32,
            duration_ms: elapsed_ms(started),
        },
    })
}

fn write_cover_sheet(
    workbook: &mut Workbook,
    config: &Configuration,
    signals: &[ApplicationSignal],
    rows: &[IoRow],
    generated_at_utc: DateTime<Utc>,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(COVER_SHEET_NAME)?;
    sheet.set_column_width(0, 24.0)?;
    sheet.set_column_width(1, 44.0)?;

    let title_format = Format::new().set_bold().set_font_size(16);
    sheet.write_string_with_format(0, 0, "I/O Mapping List", &title_format)?;

    let label_format = Format::new().set_bold();
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
    let mut row_num: u32 = 2;
    for (label, value) in entries {
        sheet.write_string_with_format(row_num, 0, label, &label_format)?;
        sheet.write_string(row_num, 1, &value)?;
        row_num += 1;
    }
    Ok(())
}

fn write_io_list_sheet(
    workbook: &mut Workbook,
    rows: &[IoRow],
    header_format: &Format,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(IO_LIST_SHEET_NAME)?;
    write_headers(sheet, &IO_CSV_HEADERS_V1, header_format)?;
    sheet.set_freeze_panes(1, 0)?;
    for (col, width) in IO_LIST_COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    let section_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(SECTION_FILL));
    let badge = |colors: (u32, u32)| {
        Format::new()
            .set_background_color(Color::RGB(colors.0))
            .set_font_color(Color::RGB(colors.1))
    };

    let mut row_num: u32 = 1;
    let mut last_group: Option<String> = None;
    for row in rows {
        let group_key = section_group_key(row);
        if last_group.as_deref() != Some(group_key.as_str()) {
            sheet.write_string_with_format(row_num, 0, &section_label(row), &section_format)?;
            row_num += 1;
            last_group = Some(group_key);
        }

        let cells = row_cells(row);
        sheet.write_number(row_num, 0, f64::from(row.index))?;
        for (col, cell) in cells.iter().enumerate().skip(1) {
            sheet.write_string(row_num, col as u16, cell)?;
        }

        // 类型与状态徽标：覆盖写入带色单元格
        let effective_type = row.signal_type.as_ref().or(row.app_signal_type.as_ref());
        if let Some(signal_type) = effective_type {
            let col: u16 = if row.signal_type.is_some() { 6 } else { 11 };
            let format = badge(signal_type_colors(signal_type));
            sheet.write_string_with_format(row_num, col, signal_type.as_str(), &format)?;
        }
        let status_format = badge(status_colors(&row.status));
        sheet.write_string_with_format(row_num, 8, row.status.as_str(), &status_format)?;

        row_num += 1;
    }

    let last_row = row_num.saturating_sub(1);
    sheet.autofilter(0, 0, last_row, (IO_CSV_HEADERS_V1.len() - 1) as u16)?;
    Ok(())
}

fn write_modules_sheet(
    workbook: &mut Workbook,
    config: &Configuration,
    header_format: &Format,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(HW_MODULES_SHEET_NAME)?;
    write_headers(sheet, &HW_MODULES_HEADERS, header_format)?;

    let mut row_num: u32 = 1;
    for entry in summarize_modules(config) {
        sheet.write_string(row_num, 0, &entry.rack_id)?;
        sheet.write_number(row_num, 1, f64::from(entry.rack_position))?;
        sheet.write_string(row_num, 2, &entry.model)?;
        sheet.write_string(row_num, 3, &entry.name)?;
        sheet.write_number(row_num, 4, f64::from(entry.channels))?;
        sheet.write_number(row_num, 5, f64::from(entry.mapped))?;
        row_num += 1;
    }
    Ok(())
}

fn write_devices_sheet(
    workbook: &mut Workbook,
    config: &Configuration,
    header_format: &Format,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(COM_DEVICES_SHEET_NAME)?;
    write_headers(sheet, &COM_DEVICES_HEADERS, header_format)?;

    let mut row_num: u32 = 1;
    for entry in summarize_devices(config) {
        sheet.write_string(row_num, 0, &entry.name)?;
        sheet.write_string(row_num, 1, &entry.model)?;
        sheet.write_string(row_num, 2, &entry.protocol)?;
        sheet.write_string(row_num, 3, &entry.ip_address)?;
        sheet.write_number(row_num, 4, f64::from(entry.registers))?;
        sheet.write_number(row_num, 5, f64::from(entry.mapped))?;
        row_num += 1;
    }
    Ok(())
}

fn write_summary_sheet(
    workbook: &mut Workbook,
    rows: &[IoRow],
    header_format: &Format,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(SUMMARY_SHEET_NAME)?;
    write_headers(sheet, &SUMMARY_HEADERS, header_format)?;

    let mut total_mapped: u32 = 0;
    let mut total_grounded: u32 = 0;
    let mut total_unmapped: u32 = 0;
    let mut row_num: u32 = 1;
    for entry in summarize_by_type(rows) {
        sheet.write_string(row_num, 0, entry.label)?;
        sheet.write_number(row_num, 1, f64::from(entry.counts.mapped))?;
        sheet.write_number(row_num, 2, f64::from(entry.counts.grounded))?;
        sheet.write_number(row_num, 3, f64::from(entry.counts.unmapped))?;
        sheet.write_number(row_num, 4, f64::from(entry.counts.total()))?;
        total_mapped += entry.counts.mapped;
        total_grounded += entry.counts.grounded;
        total_unmapped += entry.counts.unmapped;
        row_num += 1;
    }
    sheet.write_string_with_format(row_num, 0, "TOTAL", header_format)?;
    sheet.write_number(row_num, 1, f64::from(total_mapped))?;
    sheet.write_number(row_num, 2, f64::from(total_grounded))?;
    sheet.write_number(row_num, 3, f64::from(total_unmapped))?;
    sheet.write_number(
        row_num,
        4,
        f64::from(total_mapped + total_grounded + total_unmapped),
    )?;
    Ok(())
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str], format: &Format) -> Result<(), XlsxError> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, format)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use uuid::Uuid;

    use crate::core::model::{
        ByteOrder32, FieldbusDevice, FieldbusProtocol, FieldbusRegister, HardwareChannel,
        HardwareModule, Mapping, MappingSource, MappingStatus, RegisterDataType, SignalScaling,
        SignalType,
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
                tag: String::new(),
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
    fn workbook_writes_file_and_returns_frozen_headers() {
        let dir = std::env::temp_dir().join(format!("iomap-workbook-{}", Uuid::new_v4()));
        let out_path = dir.join("io_workbook.test.xlsx");
        std::fs::create_dir_all(&dir).unwrap();

        let (config, signals) = demo_config();
        let outcome = export_workbook(&out_path, &config, &signals, timestamp()).unwrap();

        assert_eq!(outcome.headers.len(), 21);
        assert_eq!(outcome.headers[0], "Index");
        // 1 通道 + 1 寄存器 + 1 尾部未映射信号
        assert_eq!(outcome.diagnostics.exported_rows, 3);
        assert!(outcome.warnings.is_empty());

        let metadata = std::fs::metadata(&out_path).unwrap();
        assert!(metadata.len() > 0);
    }

    #[test]
    fn workbook_without_devices_still_saves() {
        let dir = std::env::temp_dir().join(format!("iomap-workbook-{}", Uuid::new_v4()));
        let out_path = dir.join("io_workbook.nodev.test.xlsx");
        std::fs::create_dir_all(&dir).unwrap();

        let (mut config, signals) = demo_config();
        config.devices.clear();
        let outcome = export_workbook(&out_path, &config, &signals, timestamp()).unwrap();

        assert_eq!(outcome.diagnostics.exported_rows, 2);
        assert!(std::fs::metadata(&out_path).unwrap().len() > 0);
    }

    #[test]
    fn dangling_references_surface_as_warnings() {
        let dir = std::env::temp_dir().join(format!("iomap-workbook-{}", Uuid::new_v4()));
        let out_path = dir.join("io_workbook.warn.test.xlsx");
        std::fs::create_dir_all(&dir).unwrap();

        let (mut config, _) = demo_config();
        config.mappings[0].application_signal_id = "sig-gone".to_string();
        let outcome = export_workbook(&out_path, &config, &[], timestamp()).unwrap();

        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.code == "MAPPING_SIGNAL_MISSING"));
    }

    #[test]
    fn empty_configuration_exports_header_only_list() {
        let dir = std::env::temp_dir().join(format!("iomap-workbook-{}", Uuid::new_v4()));
        let out_path = dir.join("io_workbook.empty.test.xlsx");
        std::fs::create_dir_all(&dir).unwrap();

        let outcome =
            export_workbook(&out_path, &Configuration::new("EMPTY"), &[], timestamp()).unwrap();
        assert_eq!(outcome.diagnostics.exported_rows, 0);
        assert!(std::fs::metadata(&out_path).unwrap().len() > 0);
    }
}
