//! 导出层：同一份 (Configuration, ApplicationSignal 目录) 渲染为五种交付物。
//!
//! 约束：
//! - 导出永不因配置不一致失败：缺口降级渲染并产出告警码。
//! - 顺序确定性：同一配置 + 同一 generatedAtUtc 重复导出字节一致。
//! - 类型/状态配色跨 XLSX 与 HTML 共用，改色即 bump 版本。

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod export_bundle;
pub mod export_io_csv;
pub mod export_plc_xml;
pub mod export_report_html;
pub mod export_snapshot;
pub mod export_var_list;
pub mod export_workbook;

/// 写入交付物的 generator 标识。
pub const GENERATOR_TAG: &str = concat!("iomap_core/", env!("CARGO_PKG_VERSION"));

/// 空白显示列的占位符（notes 与 tag 列除外，原样输出）。
pub const PLACEHOLDER: &str = "—";

/// 信号类型配色 (fill, font)，Excel 标准浅色系。
pub const COLOR_DI: (u32, u32) = (0xDDEBF7, 0x1F4E79);
pub const COLOR_DO: (u32, u32) = (0xFCE4D6, 0x833C00);
pub const COLOR_AI: (u32, u32) = (0xE2EFDA, 0x375623);
pub const COLOR_AO: (u32, u32) = (0xFFF2CC, 0x7F6000);

/// 映射状态配色 (fill, font)。
pub const COLOR_MAPPED: (u32, u32) = (0xC6EFCE, 0x006100);
pub const COLOR_GROUNDED: (u32, u32) = (0xFFEB9C, 0x9C6500);
pub const COLOR_UNMAPPED: (u32, u32) = (0xFFC7CE, 0x9C0006);

use crate::core::model::SignalType;
use crate::core::rows::{IoRow, RowSection, RowStatus};

pub fn signal_type_colors(signal_type: &SignalType) -> (u32, u32) {
    match signal_type {
        SignalType::DI => COLOR_DI,
        SignalType::DO => COLOR_DO,
        SignalType::AI => COLOR_AI,
        SignalType::AO => COLOR_AO,
    }
}

pub fn status_colors(status: &RowStatus) -> (u32, u32) {
    match status {
        RowStatus::Mapped => COLOR_MAPPED,
        RowStatus::Grounded => COLOR_GROUNDED,
        RowStatus::Unmapped => COLOR_UNMAPPED,
    }
}

/// 行所属分组的判等键；工作簿与 HTML 在键变化处插入分组行。
pub(crate) fn section_group_key(row: &IoRow) -> String {
    match row.section {
        RowSection::Hardware => format!("hw:{}", row.location),
        RowSection::Fieldbus => format!("com:{}", row.location),
        RowSection::Virtual => "virtual".to_string(),
    }
}

pub(crate) fn section_label(row: &IoRow) -> String {
    match row.section {
        RowSection::Hardware => format!("Rack {}", row.location),
        RowSection::Fieldbus => format!("Device {} ({})", row.location, row.electrical),
        RowSection::Virtual => "Unmapped / grounded signals".to_string(),
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDiagnostics {
    pub exported_rows: u32,
    pub duration_ms: u32,
}

pub fn sha256_digest_prefixed(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for b in digest {
        hex.push_str(&format!("{:02x}", b));
    }
    format!("sha256:{hex}")
}

/// 二进制交付物（工作簿）的摘要入口。
pub fn sha256_digest_prefixed_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for b in digest {
        hex.push_str(&format!("{:02x}", b));
    }
    format!("sha256:{hex}")
}

pub fn write_text_atomic(path: &Path, text: &str) -> Result<(), std::io::Error> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    std::fs::create_dir_all(parent)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, text)?;
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    std::fs::rename(tmp, path)?;
    Ok(())
}

pub(crate) fn elapsed_ms(started: std::time::Instant) -> u32 {
    started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32
}
