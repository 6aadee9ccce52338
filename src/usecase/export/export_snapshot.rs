//! 全保真快照导出 / 回读（备份与排障用，不供工具导入）。
//!
//! 约束：
//! - snapshot.v1 信封一旦对外使用即冻结：只允许新增可选字段。
//! - Configuration 与信号目录必须无损往返。
//! - digest 为序列化文本的 sha256，带 `sha256:` 前缀。

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::model::{ApplicationSignal, Configuration, SCHEMA_VERSION_V1};
use crate::usecase::export::{elapsed_ms, sha256_digest_prefixed, ExportDiagnostics, GENERATOR_TAG};

pub const SNAPSHOT_SPEC_VERSION_V1: &str = "v1";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotV1 {
    pub schema_version: u32,
    pub spec_version: String,
    pub generated_at_utc: DateTime<Utc>,
    pub generator: String,
    pub configuration: Configuration,
    pub application_signals: Vec<ApplicationSignal>,
}

#[derive(Debug, Error)]
pub enum ExportSnapshotError {
    #[error("snapshot serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SnapshotParseError {
    #[error("snapshot deserialize error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("unsupported snapshot schemaVersion: {schema_version}")]
    UnsupportedSchemaVersion { schema_version: u32 },

    #[error("unsupported snapshot specVersion: {spec_version}")]
    UnsupportedSpecVersion { spec_version: String },
}

#[derive(Clone, Debug)]
pub struct ExportSnapshotOutcome {
    pub json: String,
    pub digest: String,
    pub diagnostics: ExportDiagnostics,
}

pub fn export_snapshot(
    config: &Configuration,
    signals: &[ApplicationSignal],
    generated_at_utc: DateTime<Utc>,
) -> Result<ExportSnapshotOutcome, ExportSnapshotError> {
    let started = Instant::now();
    let snapshot = SnapshotV1 {
        schema_version: SCHEMA_VERSION_V1,
        spec_version: SNAPSHOT_SPEC_VERSION_V1.to_string(),
        generated_at_utc,
        generator: GENERATOR_TAG.to_string(),
        configuration: config.clone(),
        application_signals: signals.to_vec(),
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    let digest = sha256_digest_prefixed(&json);

    Ok(ExportSnapshotOutcome {
        json,
        digest,
        diagnostics: ExportDiagnostics {
            exported_rows: config.mappings.len().min(u32::MAX as usize) as u32,
            duration_ms: elapsed_ms(started),
        },
    })
}

pub fn parse_snapshot(text: &str) -> Result<SnapshotV1, SnapshotParseError> {
    let snapshot: SnapshotV1 = serde_json::from_str(text)?;
    if snapshot.schema_version != SCHEMA_VERSION_V1 {
        return Err(SnapshotParseError::UnsupportedSchemaVersion {
            schema_version: snapshot.schema_version,
        });
    }
    if snapshot.spec_version != SNAPSHOT_SPEC_VERSION_V1 {
        return Err(SnapshotParseError::UnsupportedSpecVersion {
            spec_version: snapshot.spec_version,
        });
    }
    Ok(snapshot)
}
