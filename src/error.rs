//! 映射引擎：结构化错误（供上层稳定消费/展示）。

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MappingErrorKind {
    #[serde(rename = "UnknownChannel")]
    UnknownChannel,
    #[serde(rename = "UnknownRegister")]
    UnknownRegister,
    #[serde(rename = "UnknownModule")]
    UnknownModule,
    #[serde(rename = "UnknownDevice")]
    UnknownDevice,
    #[serde(rename = "UnknownSignal")]
    UnknownSignal,
    #[serde(rename = "MappingNotFound")]
    MappingNotFound,
    #[serde(rename = "GroundedMapping")]
    GroundedMapping,
    #[serde(rename = "DegenerateScaling")]
    DegenerateScaling,
    #[serde(rename = "NonFiniteScaling")]
    NonFiniteScaling,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MappingErrorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct MappingError {
    pub kind: MappingErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<MappingErrorDetails>,
}

impl MappingError {
    pub fn unknown_channel(channel_id: Uuid) -> Self {
        Self {
            kind: MappingErrorKind::UnknownChannel,
            message: format!("hardware channel not found: {channel_id}"),
            details: Some(MappingErrorDetails {
                channel_id: Some(channel_id),
                ..Default::default()
            }),
        }
    }

    pub fn unknown_register(register_id: Uuid) -> Self {
        Self {
            kind: MappingErrorKind::UnknownRegister,
            message: format!("fieldbus register not found: {register_id}"),
            details: Some(MappingErrorDetails {
                register_id: Some(register_id),
                ..Default::default()
            }),
        }
    }

    pub fn unknown_module(module_id: Uuid) -> Self {
        Self {
            kind: MappingErrorKind::UnknownModule,
            message: format!("hardware module not found: {module_id}"),
            details: Some(MappingErrorDetails {
                module_id: Some(module_id),
                ..Default::default()
            }),
        }
    }

    pub fn unknown_device(device_id: Uuid) -> Self {
        Self {
            kind: MappingErrorKind::UnknownDevice,
            message: format!("fieldbus device not found: {device_id}"),
            details: Some(MappingErrorDetails {
                device_id: Some(device_id),
                ..Default::default()
            }),
        }
    }

    pub fn unknown_signal(signal_id: &str) -> Self {
        Self {
            kind: MappingErrorKind::UnknownSignal,
            message: format!("application signal not found in catalog: {signal_id}"),
            details: Some(MappingErrorDetails {
                signal_id: Some(signal_id.to_string()),
                ..Default::default()
            }),
        }
    }

    pub fn mapping_not_found(mapping_id: Uuid) -> Self {
        Self {
            kind: MappingErrorKind::MappingNotFound,
            message: format!("mapping not found: {mapping_id}"),
            details: Some(MappingErrorDetails {
                mapping_id: Some(mapping_id),
                ..Default::default()
            }),
        }
    }

    pub fn grounded_mapping(mapping_id: Uuid) -> Self {
        Self {
            kind: MappingErrorKind::GroundedMapping,
            message: "cannot set scaling on a grounded mapping".to_string(),
            details: Some(MappingErrorDetails {
                mapping_id: Some(mapping_id),
                ..Default::default()
            }),
        }
    }

    pub fn degenerate_scaling(field: &str, raw_value: String) -> Self {
        Self {
            kind: MappingErrorKind::DegenerateScaling,
            message: format!("scaling {field} has zero span"),
            details: Some(MappingErrorDetails {
                field: Some(field.to_string()),
                raw_value: Some(raw_value),
                ..Default::default()
            }),
        }
    }

    pub fn non_finite_scaling(field: &str, raw_value: String) -> Self {
        Self {
            kind: MappingErrorKind::NonFiniteScaling,
            message: format!("scaling {field} is not a finite number"),
            details: Some(MappingErrorDetails {
                field: Some(field.to_string()),
                raw_value: Some(raw_value),
                ..Default::default()
            }),
        }
    }

    /// 在既有错误上补充映射 id 上下文（细节缺省时先建缺省结构）。
    pub fn with_mapping(mut self, mapping_id: Uuid) -> Self {
        self.details
            .get_or_insert_with(Default::default)
            .mapping_id = Some(mapping_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_error_serializes_kind_and_camel_case_details() {
        let err = MappingError::unknown_signal("sig-1");
        let json = serde_json::to_string_pretty(&err).unwrap();
        assert!(json.contains("\"kind\": \"UnknownSignal\""));
        assert!(json.contains("\"signalId\": \"sig-1\""));
        assert!(!json.contains("signal_id"));

        let decoded: MappingError = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, err);
    }

    #[test]
    fn with_mapping_attaches_id_to_existing_details() {
        let id = Uuid::from_u128(7);
        let err = MappingError::degenerate_scaling("rawRange", "4..4".to_string()).with_mapping(id);
        assert_eq!(err.details.as_ref().unwrap().mapping_id, Some(id));
        assert_eq!(err.details.as_ref().unwrap().field.as_deref(), Some("rawRange"));
    }

    #[test]
    fn display_uses_message() {
        let err = MappingError::mapping_not_found(Uuid::from_u128(3));
        assert!(err.to_string().contains("mapping not found"));
    }
}
