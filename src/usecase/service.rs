//! Application layer service wrapping the mapping configuration.
//! Keeps orchestration (mutation plus re-validation) away from exporters.

use uuid::Uuid;

use crate::core::idgen::MappingIdGen;
use crate::core::model::{
    ApplicationSignal, Configuration, Issue, Mapping, MappingSource, SignalScaling,
};
use crate::core::template::{self, DeviceTemplate, ModuleTemplate};
use crate::error::MappingError;
use crate::usecase::{manager, validate};

/// Owns the working configuration and the application signal catalog.
/// Every mutation re-runs validation so `issues()` is never stale.
pub struct MappingService {
    config: Configuration,
    signals: Vec<ApplicationSignal>,
    idgen: Box<dyn MappingIdGen>,
    issues: Vec<Issue>,
}

impl MappingService {
    /// Create a service for a fresh project with the given signal catalog.
    pub fn new(
        project_name: &str,
        signals: Vec<ApplicationSignal>,
        idgen: Box<dyn MappingIdGen>,
    ) -> Self {
        let mut service = Self {
            config: Configuration::new(project_name),
            signals,
            idgen,
            issues: Vec::new(),
        };
        service.revalidate();
        service
    }

    /// Rebuild a service from a previously exported configuration.
    pub fn from_parts(
        config: Configuration,
        signals: Vec<ApplicationSignal>,
        idgen: Box<dyn MappingIdGen>,
    ) -> Self {
        let mut service = Self {
            config,
            signals,
            idgen,
            issues: Vec::new(),
        };
        service.revalidate();
        service
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn signals(&self) -> &[ApplicationSignal] {
        &self.signals
    }

    /// Issues from the most recent validation run.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Instantiate a module template at the given rack slot and add it.
    pub fn add_module(
        &mut self,
        template: &ModuleTemplate,
        rack_id: &str,
        rack_position: u32,
    ) -> Uuid {
        let module =
            template::instantiate_module(template, rack_id, rack_position, self.idgen.as_mut());
        let id = module.id;
        self.config.modules.push(module);
        self.revalidate();
        id
    }

    /// Instantiate a device template with connection parameters and add it.
    pub fn add_device(
        &mut self,
        template: &DeviceTemplate,
        name: &str,
        ip_address: &str,
        port: u16,
        unit_id: u8,
        poll_rate_ms: u32,
    ) -> Uuid {
        let device = template::instantiate_device(
            template,
            name,
            ip_address,
            port,
            unit_id,
            poll_rate_ms,
            self.idgen.as_mut(),
        );
        let id = device.id;
        self.config.devices.push(device);
        self.revalidate();
        id
    }

    /// Bind a physical source to an application signal (last write wins).
    pub fn bind(
        &mut self,
        source: MappingSource,
        application_signal_id: &str,
    ) -> Result<Mapping, MappingError> {
        let mapping = manager::bind(
            &mut self.config,
            self.idgen.as_mut(),
            source,
            application_signal_id,
            &self.signals,
        )?;
        self.revalidate();
        Ok(mapping)
    }

    /// Ground an application signal to a constant value.
    pub fn ground(
        &mut self,
        application_signal_id: &str,
        value: &str,
    ) -> Result<Mapping, MappingError> {
        let mapping = manager::ground(
            &mut self.config,
            self.idgen.as_mut(),
            application_signal_id,
            value,
            &self.signals,
        )?;
        self.revalidate();
        Ok(mapping)
    }

    /// Remove a mapping by id. Returns false when the id is unknown.
    pub fn unbind(&mut self, mapping_id: Uuid) -> bool {
        let removed = manager::unbind(&mut self.config, mapping_id);
        if removed {
            self.revalidate();
        }
        removed
    }

    /// Replace the scaling on a non-grounded mapping.
    pub fn set_scaling(
        &mut self,
        mapping_id: Uuid,
        scaling: SignalScaling,
    ) -> Result<(), MappingError> {
        manager::set_scaling(&mut self.config, mapping_id, scaling)?;
        self.revalidate();
        Ok(())
    }

    /// Overwrite the free-text tag on a hardware channel.
    pub fn retag_channel(&mut self, channel_id: Uuid, tag: &str) -> Result<(), MappingError> {
        manager::retag_channel(&mut self.config, channel_id, tag)?;
        self.revalidate();
        Ok(())
    }

    /// Remove a module and cascade-delete mappings bound to its channels.
    /// Returns the number of mappings removed.
    pub fn remove_module(&mut self, module_id: Uuid) -> Result<u32, MappingError> {
        let removed = manager::remove_module(&mut self.config, module_id)?;
        self.revalidate();
        Ok(removed)
    }

    /// Remove a device and cascade-delete mappings bound to its registers.
    /// Returns the number of mappings removed.
    pub fn remove_device(&mut self, device_id: Uuid) -> Result<u32, MappingError> {
        let removed = manager::remove_device(&mut self.config, device_id)?;
        self.revalidate();
        Ok(removed)
    }

    /// Bump the configuration version and return a deep copy for export.
    pub fn take_snapshot(&mut self) -> Configuration {
        self.config.version += 1;
        self.config.clone()
    }

    fn revalidate(&mut self) {
        self.issues = validate::validate(&self.config, &self.signals);
        log::debug!("validation produced {} issue(s)", self.issues.len());
    }
}
