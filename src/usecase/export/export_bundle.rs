//! 交付包导出：全部交付物落盘到同一目录并生成带摘要的清单。
//!
//! 约束：
//! - 文件名固定；manifest.json 最后写入，收录其余文件的 sha256 摘要。
//! - 文本交付物经原子写入落盘；工作簿由 xlsx 写库直接保存。
//! - 各出口重复上报的降级告警在清单中去重，保序取首见。

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::model::{ApplicationSignal, Configuration, ExportWarning, SCHEMA_VERSION_V1};
use crate::usecase::export::export_io_csv::export_io_csv;
use crate::usecase::export::export_plc_xml::{export_plc_xml, ExportXmlError};
use crate::usecase::export::export_report_html::export_report_html;
use crate::usecase::export::export_snapshot::{export_snapshot, ExportSnapshotError};
use crate::usecase::export::export_var_list::export_var_list;
use crate::usecase::export::export_workbook::{export_workbook, ExportWorkbookError};
use crate::usecase::export::{
    elapsed_ms, sha256_digest_prefixed, sha256_digest_prefixed_bytes, write_text_atomic,
    ExportDiagnostics, GENERATOR_TAG,
};
use crate::usecase::validate::validate;

pub const BUNDLE_XML_FILE: &str = "plc_io_config.xml";
pub const BUNDLE_CSV_FILE: &str = "io_list.csv";
pub const BUNDLE_VAR_LIST_FILE: &str = "global_vars.st";
pub const BUNDLE_SNAPSHOT_FILE: &str = "snapshot.json";
pub const BUNDLE_HTML_FILE: &str = "io_report.html";
pub const BUNDLE_WORKBOOK_FILE: &str = "io_workbook.xlsx";
pub const BUNDLE_MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ExportBundleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml artifact failed: {0}")]
    Xml(#[from] ExportXmlError),

    #[error("workbook artifact failed: {0}")]
    Workbook(#[from] ExportWorkbookError),

    #[error("snapshot artifact failed: {0}")]
    Snapshot(#[from] ExportSnapshotError),

    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BundleFileEntry {
    pub file: String,
    pub digest: String,
    pub bytes: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifestV1 {
    pub schema_version: u32,
    pub generated_at_utc: String,
    pub generator: String,
    pub project_name: String,
    pub configuration_version: u32,
    pub exported_rows: u32,
    pub validation_issues: u32,
    pub files: Vec<BundleFileEntry>,
    pub warnings: Vec<ExportWarning>,
}

#[derive(Clone, Debug)]
pub struct ExportBundleOutcome {
    pub manifest: BundleManifestV1,
    pub diagnostics: ExportDiagnostics,
}

pub fn export_bundle(
    out_dir: &Path,
    config: &Configuration,
    signals: &[ApplicationSignal],
    generated_at_utc: DateTime<Utc>,
    include_workbook: bool,
) -> Result<ExportBundleOutcome, ExportBundleError> {
    let started = Instant::now();
    let mut files: Vec<BundleFileEntry> = Vec::new();
    let mut warnings: Vec<ExportWarning> = Vec::new();
    let mut seen: HashSet<ExportWarning> = HashSet::new();
    let collect = |incoming: Vec<ExportWarning>,
                   warnings: &mut Vec<ExportWarning>,
                   seen: &mut HashSet<ExportWarning>| {
        for warning in incoming {
            if seen.insert(warning.clone()) {
                warnings.push(warning);
            }
        }
    };

    let xml = export_plc_xml(config, signals, generated_at_utc)?;
    write_text_atomic(&out_dir.join(BUNDLE_XML_FILE), &xml.xml)?;
    files.push(text_entry(BUNDLE_XML_FILE, &xml.xml));
    collect(xml.warnings, &mut warnings, &mut seen);

    let csv = export_io_csv(config, signals);
    write_text_atomic(&out_dir.join(BUNDLE_CSV_FILE), &csv.csv)?;
    files.push(text_entry(BUNDLE_CSV_FILE, &csv.csv));
    collect(csv.warnings, &mut warnings, &mut seen);

    let vars = export_var_list(config, signals);
    write_text_atomic(&out_dir.join(BUNDLE_VAR_LIST_FILE), &vars.text)?;
    files.push(text_entry(BUNDLE_VAR_LIST_FILE, &vars.text));
    collect(vars.warnings, &mut warnings, &mut seen);

    let snapshot = export_snapshot(config, signals, generated_at_utc)?;
    write_text_atomic(&out_dir.join(BUNDLE_SNAPSHOT_FILE), &snapshot.json)?;
    files.push(text_entry(BUNDLE_SNAPSHOT_FILE, &snapshot.json));

    let report = export_report_html(config, signals, generated_at_utc);
    write_text_atomic(&out_dir.join(BUNDLE_HTML_FILE), &report.html)?;
    files.push(text_entry(BUNDLE_HTML_FILE, &report.html));
    collect(report.warnings, &mut warnings, &mut seen);

    if include_workbook {
        let workbook_path = out_dir.join(BUNDLE_WORKBOOK_FILE);
        let workbook = export_workbook(&workbook_path, config, signals, generated_at_utc)?;
        let bytes = std::fs::read(&workbook_path)?;
        files.push(BundleFileEntry {
            file: BUNDLE_WORKBOOK_FILE.to_string(),
            digest: sha256_digest_prefixed_bytes(&bytes),
            bytes: bytes.len() as u64,
        });
        collect(workbook.warnings, &mut warnings, &mut seen);
    }

    let exported_rows = csv.diagnostics.exported_rows;
    let issues = validate(config, signals);
    let manifest = BundleManifestV1 {
        schema_version: SCHEMA_VERSION_V1,
        generated_at_utc: generated_at_utc.to_rfc3339_opts(SecondsFormat::Secs, true),
        generator: GENERATOR_TAG.to_string(),
        project_name: config.project_name.clone(),
        configuration_version: config.version,
        exported_rows,
        validation_issues: issues.len().min(u32::MAX as usize) as u32,
        files,
        warnings,
    };
    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    write_text_atomic(&out_dir.join(BUNDLE_MANIFEST_FILE), &manifest_json)?;

    log::info!(
        "bundle exported: {} file(s), {} row(s), {} issue(s)",
        manifest.files.len() + 1,
        manifest.exported_rows,
        manifest.validation_issues
    );

    Ok(ExportBundleOutcome {
        diagnostics: ExportDiagnostics {
            exported_rows,
            duration_ms: elapsed_ms(started),
        },
        manifest,
    })
}

fn text_entry(file: &str, text: &str) -> BundleFileEntry {
    BundleFileEntry {
        file: file.to_string(),
        digest: sha256_digest_prefixed(text),
        bytes: text.len() as u64,
    }
}
