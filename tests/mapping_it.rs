use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use iomap_core::usecase::export::export_bundle::{
    export_bundle, BUNDLE_CSV_FILE, BUNDLE_HTML_FILE, BUNDLE_MANIFEST_FILE, BUNDLE_SNAPSHOT_FILE,
    BUNDLE_VAR_LIST_FILE, BUNDLE_WORKBOOK_FILE, BUNDLE_XML_FILE,
};
use iomap_core::usecase::export::export_io_csv::export_io_csv;
use iomap_core::usecase::export::export_plc_xml::export_plc_xml;
use iomap_core::usecase::export::export_report_html::export_report_html;
use iomap_core::usecase::export::export_snapshot::{export_snapshot, parse_snapshot};
use iomap_core::usecase::export::export_var_list::export_var_list;
use iomap_core::core::template::{instantiate_device, instantiate_module};
use iomap_core::{
    validate, ApplicationSignal, ByteOrder32, ChannelTemplate, Configuration, DeviceTemplate,
    FieldbusProtocol, IssueCategory, Mapping, MappingIdGen, MappingService, MappingSource,
    MappingStatus, ModuleTemplate, RegisterDataType, RegisterTemplate, SequenceIdGen, SignalType,
};

fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}

fn signal(
    id: &str,
    component: &str,
    name: &str,
    signal_type: SignalType,
    required: bool,
) -> ApplicationSignal {
    ApplicationSignal {
        id: id.to_string(),
        component_name: component.to_string(),
        signal_name: name.to_string(),
        signal_type,
        data_type: None,
        required,
    }
}

fn pump_station_signals() -> Vec<ApplicationSignal> {
    let mut feedback = signal("sig-fb", "PumpC_01", "Speed_Feedback", SignalType::AI, true);
    feedback.data_type = Some("REAL".to_string());
    vec![
        feedback,
        signal("sig-cmd", "PumpC_01", "Speed_Command", SignalType::AO, true),
        signal("sig-en", "PumpC_01", "Enable", SignalType::DI, true),
        signal("sig-run", "PumpC_01", "Running", SignalType::DO, false),
        signal("sig-press", "Station", "Inlet_Pressure", SignalType::AI, true),
    ]
}

fn ai8_template() -> ModuleTemplate {
    ModuleTemplate {
        model: "AI8-16B".to_string(),
        manufacturer: "Acme".to_string(),
        name: "Analog In 8ch".to_string(),
        channels: vec![ChannelTemplate {
            count: 8,
            signal_type: SignalType::AI,
            electrical_type: "4-20mA".to_string(),
            resolution: Some("16bit".to_string()),
        }],
        color: "#4472C4".to_string(),
    }
}

fn dio8_template() -> ModuleTemplate {
    ModuleTemplate {
        model: "DIO8".to_string(),
        manufacturer: "Acme".to_string(),
        name: "Digital Mixed 8ch".to_string(),
        channels: vec![
            ChannelTemplate {
                count: 4,
                signal_type: SignalType::DI,
                electrical_type: "24VDC".to_string(),
                resolution: None,
            },
            ChannelTemplate {
                count: 4,
                signal_type: SignalType::DO,
                electrical_type: "Relay".to_string(),
                resolution: None,
            },
        ],
        color: String::new(),
    }
}

fn genset_template() -> DeviceTemplate {
    DeviceTemplate {
        model: "GEN-CTRL".to_string(),
        name: "Genset Controller".to_string(),
        protocol: FieldbusProtocol::ModbusTcp,
        default_registers: vec![
            RegisterTemplate {
                name: "Speed_Ref".to_string(),
                signal_type: SignalType::AO,
                data_type: RegisterDataType::UInt16,
                address: 100,
                slot: None,
                subslot: None,
                byte_order: ByteOrder32::ABCD,
                scale_factor: 0.1,
            },
            RegisterTemplate {
                name: "Run_Status".to_string(),
                signal_type: SignalType::DI,
                data_type: RegisterDataType::Bool,
                address: 0,
                slot: None,
                subslot: None,
                byte_order: ByteOrder32::ABCD,
                scale_factor: 1.0,
            },
        ],
    }
}

fn pump_station_service() -> MappingService {
    MappingService::new(
        "PUMP_STATION",
        pump_station_signals(),
        Box::new(SequenceIdGen::new(1)),
    )
}

#[test]
fn bind_gives_analog_mapping_a_default_current_loop_scaling() {
    let mut service = pump_station_service();
    service.add_module(&ai8_template(), "X100", 1);
    let channel_id = service.config().modules[0].channels[0].id;

    let mapping = service
        .bind(MappingSource::Hw { channel_id }, "sig-fb")
        .unwrap();

    assert_eq!(mapping.status, MappingStatus::Mapped);
    let scaling = mapping.scaling.unwrap();
    assert_eq!(scaling.raw_min, 4.0);
    assert_eq!(scaling.raw_max, 20.0);
    assert_eq!(scaling.eng_min, 0.0);
    assert_eq!(scaling.eng_max, 100.0);
    assert!(scaling.clamp_enabled);

    // the bound pair is clean: no mismatch, target satisfied, source taken
    assert!(!service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::TypeMismatch));
    assert!(!service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedRequired
            && i.signal_id.as_deref() == Some("sig-fb")));
    assert!(!service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedHw && i.channel_id == Some(channel_id)));

    // the other seven channels and the remaining required signals still report
    let unmapped_hw = service
        .issues()
        .iter()
        .filter(|i| i.category == IssueCategory::UnmappedHw)
        .count();
    assert_eq!(unmapped_hw, 7);
    let unmapped_required: Vec<&str> = service
        .issues()
        .iter()
        .filter(|i| i.category == IssueCategory::UnmappedRequired)
        .filter_map(|i| i.signal_id.as_deref())
        .collect();
    assert_eq!(unmapped_required, vec!["sig-cmd", "sig-en", "sig-press"]);
}

#[test]
fn binding_analog_channel_to_discrete_signal_reports_type_mismatch() {
    let mut service = pump_station_service();
    service.add_module(&ai8_template(), "X100", 1);
    let channel_id = service.config().modules[0].channels[0].id;

    service
        .bind(MappingSource::Hw { channel_id }, "sig-en")
        .unwrap();

    let mismatch = service
        .issues()
        .iter()
        .find(|i| i.category == IssueCategory::TypeMismatch)
        .expect("mismatch must be reported");
    assert_eq!(mismatch.channel_id, Some(channel_id));
    assert_eq!(mismatch.signal_id.as_deref(), Some("sig-en"));
    assert!(mismatch.message.contains("AI"));
    assert!(mismatch.message.contains("DI"));
}

#[test]
fn grounding_satisfies_a_required_signal_and_exports_a_constant() {
    let mut service = pump_station_service();
    service.add_module(&dio8_template(), "X200", 2);

    let mapping = service.ground("sig-en", "FALSE").unwrap();
    assert!(mapping.grounded);
    assert_eq!(mapping.ground_value.as_deref(), Some("FALSE"));
    assert_eq!(mapping.status, MappingStatus::Grounded);
    assert!(!service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedRequired
            && i.signal_id.as_deref() == Some("sig-en")));

    let csv = export_io_csv(service.config(), service.signals());
    assert!(csv
        .csv
        .lines()
        .any(|line| line.contains("grounded") && line.contains("FALSE")));

    let vars = export_var_list(service.config(), service.signals());
    assert!(vars.text.contains("(* Grounded constants *)"));
    assert!(vars
        .text
        .contains("PumpC_01_Enable : BOOL := FALSE; (* grounded *)"));
}

#[test]
fn rebinding_a_source_supersedes_the_previous_mapping() {
    let mut service = pump_station_service();
    service.add_module(&ai8_template(), "X100", 1);
    let channel_id = service.config().modules[0].channels[0].id;

    let first = service
        .bind(MappingSource::Hw { channel_id }, "sig-fb")
        .unwrap();
    let second = service
        .bind(MappingSource::Hw { channel_id }, "sig-press")
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(service.config().mappings.len(), 1);
    assert_eq!(
        service.config().mappings[0].application_signal_id,
        "sig-press"
    );
    // the superseded target is unmapped again
    assert!(service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedRequired
            && i.signal_id.as_deref() == Some("sig-fb")));
    assert!(!service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::Duplicate));
}

#[test]
fn rebinding_a_signal_frees_the_previous_channel() {
    let mut service = pump_station_service();
    service.add_module(&ai8_template(), "X100", 1);
    let first_channel = service.config().modules[0].channels[0].id;
    let second_channel = service.config().modules[0].channels[1].id;

    service
        .bind(
            MappingSource::Hw {
                channel_id: first_channel,
            },
            "sig-fb",
        )
        .unwrap();
    service
        .bind(
            MappingSource::Hw {
                channel_id: second_channel,
            },
            "sig-fb",
        )
        .unwrap();

    assert_eq!(service.config().mappings.len(), 1);
    assert!(service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedHw && i.channel_id == Some(first_channel)));
    assert!(!service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedHw
            && i.channel_id == Some(second_channel)));
}

#[test]
fn fieldbus_registers_bind_and_cascade_on_device_removal() {
    let mut service = pump_station_service();
    let device_id = service.add_device(&genset_template(), "GEN-01", "192.168.0.10", 502, 1, 500);
    let register_id = service.config().devices[0].registers[0].id;

    service
        .bind(MappingSource::Com { register_id }, "sig-cmd")
        .unwrap();
    assert!(!service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedCom && i.register_id == Some(register_id)));

    let removed = service.remove_device(device_id).unwrap();
    assert_eq!(removed, 1);
    assert!(service.config().devices.is_empty());
    assert!(service.config().mappings.is_empty());
    assert!(service
        .issues()
        .iter()
        .any(|i| i.category == IssueCategory::UnmappedRequired
            && i.signal_id.as_deref() == Some("sig-cmd")));
}

#[test]
fn bulk_imported_configuration_reports_duplicates_and_missing_scaling() {
    // a raw configuration the way an importer would hand it over, conflicts kept
    let signals = pump_station_signals();
    let mut config = Configuration::new("IMPORTED");
    let mut idgen = SequenceIdGen::new(1);
    let module = instantiate_module(&ai8_template(), "X100", 1, &mut idgen);
    let device = instantiate_device(
        &genset_template(),
        "GEN-01",
        "192.168.0.10",
        502,
        1,
        500,
        &mut idgen,
    );
    let channel_id = module.channels[0].id;
    let register_id = device.registers[0].id;
    config.modules = vec![module];
    config.devices = vec![device];
    config.mappings = vec![
        Mapping {
            id: idgen.next_id(),
            source: Some(MappingSource::Hw { channel_id }),
            application_signal_id: "sig-fb".to_string(),
            scaling: None,
            grounded: false,
            ground_value: None,
            status: MappingStatus::Mapped,
        },
        Mapping {
            id: idgen.next_id(),
            source: Some(MappingSource::Hw { channel_id }),
            application_signal_id: "sig-press".to_string(),
            scaling: None,
            grounded: false,
            ground_value: None,
            status: MappingStatus::Mapped,
        },
        Mapping {
            id: idgen.next_id(),
            source: Some(MappingSource::Com { register_id }),
            application_signal_id: "sig-cmd".to_string(),
            scaling: None,
            grounded: false,
            ground_value: None,
            status: MappingStatus::Mapped,
        },
    ];

    let issues = validate(&config, &signals);
    let duplicates = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Duplicate)
        .count();
    assert_eq!(duplicates, 1);
    let scaling_issues = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Scaling)
        .count();
    // all three analog mappings imported without scaling
    assert_eq!(scaling_issues, 3);

    // an unscaled analog target still declares as REAL in the variable list
    let vars = export_var_list(&config, &signals);
    assert!(vars.text.contains("PumpC_01_Speed_Command : REAL; (* GEN-01:Speed_Ref *)"));
}

#[test]
fn snapshot_roundtrip_restores_the_exact_configuration() {
    let mut service = pump_station_service();
    service.add_module(&ai8_template(), "X100", 1);
    service.add_device(&genset_template(), "GEN-01", "192.168.0.10", 502, 1, 500);
    let channel_id = service.config().modules[0].channels[0].id;
    service
        .bind(MappingSource::Hw { channel_id }, "sig-fb")
        .unwrap();
    service.ground("sig-en", "FALSE").unwrap();

    assert_eq!(service.config().version, 0);
    let snapshot_config = service.take_snapshot();
    assert_eq!(snapshot_config.version, 1);

    let exported = export_snapshot(&snapshot_config, service.signals(), timestamp()).unwrap();
    let parsed = parse_snapshot(&exported.json).unwrap();

    assert_eq!(parsed.configuration, snapshot_config);
    assert_eq!(parsed.application_signals, service.signals());

    // a service resumed from the snapshot sees the same validation picture
    let resumed = MappingService::from_parts(
        parsed.configuration,
        parsed.application_signals,
        Box::new(SequenceIdGen::new(1000)),
    );
    assert_eq!(resumed.issues(), service.issues());
}

#[test]
fn reexport_with_the_same_timestamp_is_byte_identical() {
    let mut service = pump_station_service();
    service.add_module(&ai8_template(), "X100", 1);
    service.add_device(&genset_template(), "GEN-01", "192.168.0.10", 502, 1, 500);
    let channel_id = service.config().modules[0].channels[0].id;
    service
        .bind(MappingSource::Hw { channel_id }, "sig-fb")
        .unwrap();

    let csv_a = export_io_csv(service.config(), service.signals());
    let csv_b = export_io_csv(service.config(), service.signals());
    assert_eq!(csv_a.csv, csv_b.csv);

    let xml_a = export_plc_xml(service.config(), service.signals(), timestamp()).unwrap();
    let xml_b = export_plc_xml(service.config(), service.signals(), timestamp()).unwrap();
    assert_eq!(xml_a.xml, xml_b.xml);

    let html_a = export_report_html(service.config(), service.signals(), timestamp());
    let html_b = export_report_html(service.config(), service.signals(), timestamp());
    assert_eq!(html_a.html, html_b.html);
}

#[test]
fn bundle_writes_the_complete_evidence_pack() {
    let dir = std::env::temp_dir().join(format!("iomap-it-bundle-{}", Uuid::new_v4()));
    let mut service = pump_station_service();
    service.add_module(&ai8_template(), "X100", 1);
    service.add_module(&dio8_template(), "X200", 2);
    service.add_device(&genset_template(), "GEN-01", "192.168.0.10", 502, 1, 500);
    let ai_channel = service.config().modules[0].channels[0].id;
    let di_channel = service.config().modules[1].channels[0].id;
    let register_id = service.config().devices[0].registers[0].id;
    service
        .bind(MappingSource::Hw { channel_id: ai_channel }, "sig-fb")
        .unwrap();
    service
        .bind(MappingSource::Hw { channel_id: di_channel }, "sig-en")
        .unwrap();
    service
        .bind(MappingSource::Com { register_id }, "sig-cmd")
        .unwrap();
    service.ground("sig-run", "FALSE").unwrap();

    let snapshot = service.take_snapshot();
    let outcome = export_bundle(&dir, &snapshot, service.signals(), timestamp(), true).unwrap();

    for file in [
        BUNDLE_XML_FILE,
        BUNDLE_CSV_FILE,
        BUNDLE_VAR_LIST_FILE,
        BUNDLE_SNAPSHOT_FILE,
        BUNDLE_HTML_FILE,
        BUNDLE_WORKBOOK_FILE,
        BUNDLE_MANIFEST_FILE,
    ] {
        assert!(dir.join(file).exists(), "missing {file}");
    }

    // 16 channels + 2 registers + 2 trailing signal rows (grounded + unmapped required)
    assert_eq!(outcome.manifest.exported_rows, 20);
    assert_eq!(
        outcome.manifest.validation_issues,
        validate(&snapshot, service.signals()).len() as u32
    );
    assert_eq!(outcome.manifest.project_name, "PUMP_STATION");
    assert_eq!(outcome.manifest.configuration_version, 1);
    assert!(outcome.manifest.warnings.is_empty());
}
