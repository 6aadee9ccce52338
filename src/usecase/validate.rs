//! 全量映射校验（纯函数，不做 IO，不修改配置）。
//!
//! 规则按固定顺序产出（输出顺序可复现）：
//! 1. type_mismatch（error）：绑定两端信号类型不一致
//! 2. unmapped_required（warning）：必需信号无任何映射（接地视为已满足）
//! 3. unmapped_hw / unmapped_com（info）：物理点未被任何映射引用
//! 4. duplicate（error）：同一物理源被多条非接地映射占用（批量导入路径可达）
//! 5. scaling（warning）：AI/AO 绑定缺换算
//!
//! 悬挂引用不会 panic：规则 1/5 跳过，规则 4 仍计其源占用，规则 2/3 按未映射处理。

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::core::model::{
    ApplicationSignal, Configuration, FieldbusRegister, HardwareChannel, Issue, IssueCategory,
    IssueSeverity, MappingSource, SignalType,
};
use crate::core::rows::register_locator;

struct Resolved<'a> {
    signal_type: &'a SignalType,
    locator: String,
    channel_id: Option<Uuid>,
    register_id: Option<Uuid>,
}

pub fn validate(config: &Configuration, signals: &[ApplicationSignal]) -> Vec<Issue> {
    let mut issues: Vec<Issue> = Vec::new();

    let mut channels: HashMap<Uuid, &HardwareChannel> = HashMap::new();
    for module in &config.modules {
        for channel in &module.channels {
            channels.insert(channel.id, channel);
        }
    }
    let mut registers: HashMap<Uuid, (&str, &FieldbusRegister)> = HashMap::new();
    for device in &config.devices {
        for register in &device.registers {
            registers.insert(register.id, (device.name.as_str(), register));
        }
    }
    let signal_map: HashMap<&str, &ApplicationSignal> =
        signals.iter().map(|s| (s.id.as_str(), s)).collect();

    let resolve = |source: &MappingSource| -> Option<Resolved<'_>> {
        match source {
            MappingSource::Hw { channel_id } => channels.get(channel_id).map(|c| Resolved {
                signal_type: &c.signal_type,
                locator: c.terminal.clone(),
                channel_id: Some(c.id),
                register_id: None,
            }),
            MappingSource::Com { register_id } => {
                registers.get(register_id).map(|(device_name, r)| Resolved {
                    signal_type: &r.signal_type,
                    locator: format!("{device_name}:{}", r.name),
                    channel_id: None,
                    register_id: Some(r.id),
                })
            }
        }
    };

    // 规则 1：type_mismatch
    for mapping in &config.mappings {
        if mapping.grounded {
            continue;
        }
        let Some(source) = &mapping.source else {
            continue;
        };
        let Some(resolved) = resolve(source) else {
            continue;
        };
        let Some(signal) = signal_map.get(mapping.application_signal_id.as_str()) else {
            continue;
        };
        if resolved.signal_type != &signal.signal_type {
            issues.push(Issue {
                severity: IssueSeverity::Error,
                category: IssueCategory::TypeMismatch,
                message: format!(
                    "signal type mismatch: source {} is {}, signal {} is {}",
                    resolved.locator,
                    resolved.signal_type.as_str(),
                    signal.signal_path(),
                    signal.signal_type.as_str()
                ),
                mapping_id: Some(mapping.id),
                channel_id: resolved.channel_id,
                register_id: resolved.register_id,
                signal_id: Some(signal.id.clone()),
            });
        }
    }

    // 规则 2：unmapped_required（目录顺序）
    let targeted: HashSet<&str> = config
        .mappings
        .iter()
        .map(|m| m.application_signal_id.as_str())
        .collect();
    for signal in signals {
        if signal.required && !targeted.contains(signal.id.as_str()) {
            issues.push(Issue {
                severity: IssueSeverity::Warning,
                category: IssueCategory::UnmappedRequired,
                message: format!("required signal {} has no mapping", signal.signal_path()),
                mapping_id: None,
                channel_id: None,
                register_id: None,
                signal_id: Some(signal.id.clone()),
            });
        }
    }

    // 规则 3：unmapped_hw（模块顺序）然后 unmapped_com（目录顺序）
    let sourced: HashSet<Uuid> = config.mappings.iter().filter_map(|m| m.source_id()).collect();
    for module in &config.modules {
        for channel in &module.channels {
            if !sourced.contains(&channel.id) {
                issues.push(Issue {
                    severity: IssueSeverity::Info,
                    category: IssueCategory::UnmappedHw,
                    message: format!("hardware channel {} is unmapped", channel.terminal),
                    mapping_id: None,
                    channel_id: Some(channel.id),
                    register_id: None,
                    signal_id: None,
                });
            }
        }
    }
    for device in &config.devices {
        for register in &device.registers {
            if !sourced.contains(&register.id) {
                issues.push(Issue {
                    severity: IssueSeverity::Info,
                    category: IssueCategory::UnmappedCom,
                    message: format!(
                        "fieldbus register {} is unmapped",
                        register_locator(device, register)
                    ),
                    mapping_id: None,
                    channel_id: None,
                    register_id: Some(register.id),
                    signal_id: None,
                });
            }
        }
    }

    // 规则 4：duplicate（数组顺序，后出现者记错）
    let mut seen_sources: HashSet<Uuid> = HashSet::new();
    for mapping in &config.mappings {
        if mapping.grounded {
            continue;
        }
        let Some(source_id) = mapping.source_id() else {
            continue;
        };
        if !seen_sources.insert(source_id) {
            let locator = mapping
                .source
                .as_ref()
                .and_then(|s| resolve(s))
                .map(|r| r.locator)
                .unwrap_or_else(|| source_id.to_string());
            issues.push(Issue {
                severity: IssueSeverity::Error,
                category: IssueCategory::Duplicate,
                message: format!(
                    "duplicate source {locator}: already bound by an earlier mapping"
                ),
                mapping_id: Some(mapping.id),
                channel_id: mapping.source_channel_id(),
                register_id: mapping.source_register_id(),
                signal_id: Some(mapping.application_signal_id.clone()),
            });
        }
    }

    // 规则 5：scaling
    for mapping in &config.mappings {
        if mapping.grounded || mapping.scaling.is_some() {
            continue;
        }
        let Some(source) = &mapping.source else {
            continue;
        };
        let Some(resolved) = resolve(source) else {
            continue;
        };
        if resolved.signal_type.is_analog() {
            issues.push(Issue {
                severity: IssueSeverity::Warning,
                category: IssueCategory::Scaling,
                message: format!(
                    "analog mapping on {} has no scaling attached",
                    resolved.locator
                ),
                mapping_id: Some(mapping.id),
                channel_id: resolved.channel_id,
                register_id: resolved.register_id,
                signal_id: Some(mapping.application_signal_id.clone()),
            });
        }
    }

    issues
}
