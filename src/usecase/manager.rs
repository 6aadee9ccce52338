//! 映射管理：绑定/接地/解绑/换算/级联删除。
//!
//! 唯一性在绑定时强制（而非仅上报）：
//! - 同一物理源同时最多承载一条非接地映射
//! - 同一应用信号同时最多被一条映射（含接地）指向
//! 冲突采用"后写覆盖"语义：bind 先移除冲突记录（至多 2 条）再新建。

use std::collections::HashSet;

use uuid::Uuid;

use crate::core::idgen::MappingIdGen;
use crate::core::model::{
    ApplicationSignal, Configuration, Mapping, MappingSource, MappingStatus, SignalScaling,
};
use crate::error::MappingError;

fn find_signal<'a>(
    signals: &'a [ApplicationSignal],
    signal_id: &str,
) -> Result<&'a ApplicationSignal, MappingError> {
    signals
        .iter()
        .find(|s| s.id == signal_id)
        .ok_or_else(|| MappingError::unknown_signal(signal_id))
}

/// 绑定物理源到应用信号；AI/AO 源自动附默认 4-20mA 换算。
pub fn bind(
    config: &mut Configuration,
    idgen: &mut dyn MappingIdGen,
    source: MappingSource,
    application_signal_id: &str,
    signals: &[ApplicationSignal],
) -> Result<Mapping, MappingError> {
    let source_signal_type = match &source {
        MappingSource::Hw { channel_id } => {
            let (_, channel) = config
                .find_channel(*channel_id)
                .ok_or_else(|| MappingError::unknown_channel(*channel_id))?;
            channel.signal_type.clone()
        }
        MappingSource::Com { register_id } => {
            let (_, register) = config
                .find_register(*register_id)
                .ok_or_else(|| MappingError::unknown_register(*register_id))?;
            register.signal_type.clone()
        }
    };
    let signal = find_signal(signals, application_signal_id)?;

    let before = config.mappings.len();
    config.mappings.retain(|m| {
        let same_source = !m.grounded && m.source.as_ref() == Some(&source);
        let same_target = m.application_signal_id == application_signal_id;
        !(same_source || same_target)
    });
    let superseded = before - config.mappings.len();
    if superseded > 0 {
        log::debug!(
            "bind superseded {superseded} mapping(s) for signal {}",
            signal.signal_path()
        );
    }

    let scaling = if source_signal_type.is_analog() {
        Some(SignalScaling::default_current_loop())
    } else {
        None
    };
    let mapping = Mapping {
        id: idgen.next_id(),
        source: Some(source),
        application_signal_id: application_signal_id.to_string(),
        scaling,
        grounded: false,
        ground_value: None,
        status: MappingStatus::Mapped,
    };
    config.mappings.push(mapping.clone());
    Ok(mapping)
}

/// 接地：给应用信号一个固定默认值，替代物理源。
pub fn ground(
    config: &mut Configuration,
    idgen: &mut dyn MappingIdGen,
    application_signal_id: &str,
    value: &str,
    signals: &[ApplicationSignal],
) -> Result<Mapping, MappingError> {
    find_signal(signals, application_signal_id)?;

    config
        .mappings
        .retain(|m| m.application_signal_id != application_signal_id);

    let mapping = Mapping {
        id: idgen.next_id(),
        source: None,
        application_signal_id: application_signal_id.to_string(),
        scaling: None,
        grounded: true,
        ground_value: Some(value.to_string()),
        status: MappingStatus::Grounded,
    };
    config.mappings.push(mapping.clone());
    Ok(mapping)
}

/// 幂等：不存在的 id 是 no-op，返回 false。
pub fn unbind(config: &mut Configuration, mapping_id: Uuid) -> bool {
    let before = config.mappings.len();
    config.mappings.retain(|m| m.id != mapping_id);
    before != config.mappings.len()
}

/// 替换非接地映射上的换算；零跨度/非有限边界在此拒绝。
pub fn set_scaling(
    config: &mut Configuration,
    mapping_id: Uuid,
    scaling: SignalScaling,
) -> Result<(), MappingError> {
    scaling.validate().map_err(|e| e.with_mapping(mapping_id))?;
    let mapping = config
        .mappings
        .iter_mut()
        .find(|m| m.id == mapping_id)
        .ok_or_else(|| MappingError::mapping_not_found(mapping_id))?;
    if mapping.grounded {
        return Err(MappingError::grounded_mapping(mapping_id));
    }
    mapping.scaling = Some(scaling);
    Ok(())
}

/// 纯装饰性元数据，不承载不变量。
pub fn retag_channel(
    config: &mut Configuration,
    channel_id: Uuid,
    tag: &str,
) -> Result<(), MappingError> {
    for module in &mut config.modules {
        if let Some(channel) = module.channels.iter_mut().find(|c| c.id == channel_id) {
            channel.tag = tag.to_string();
            return Ok(());
        }
    }
    Err(MappingError::unknown_channel(channel_id))
}

/// 级联删除：模块下所有通道作为源的映射一并删除；返回删除映射数。
pub fn remove_module(config: &mut Configuration, module_id: Uuid) -> Result<u32, MappingError> {
    let pos = config
        .modules
        .iter()
        .position(|m| m.id == module_id)
        .ok_or_else(|| MappingError::unknown_module(module_id))?;
    let module = config.modules.remove(pos);
    let channel_ids: HashSet<Uuid> = module.channels.iter().map(|c| c.id).collect();

    let before = config.mappings.len();
    config.mappings.retain(|m| match m.source_channel_id() {
        Some(channel_id) => !channel_ids.contains(&channel_id),
        None => true,
    });
    let removed = (before - config.mappings.len()) as u32;
    if removed > 0 {
        log::debug!("remove_module cascaded {removed} mapping(s)");
    }
    Ok(removed)
}

/// 对称的设备级联删除。
pub fn remove_device(config: &mut Configuration, device_id: Uuid) -> Result<u32, MappingError> {
    let pos = config
        .devices
        .iter()
        .position(|d| d.id == device_id)
        .ok_or_else(|| MappingError::unknown_device(device_id))?;
    let device = config.devices.remove(pos);
    let register_ids: HashSet<Uuid> = device.registers.iter().map(|r| r.id).collect();

    let before = config.mappings.len();
    config.mappings.retain(|m| match m.source_register_id() {
        Some(register_id) => !register_ids.contains(&register_id),
        None => true,
    });
    Ok((before - config.mappings.len()) as u32)
}
