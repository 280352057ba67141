//! Integration tests for the PidGuard checking pipeline

use pidguard::prelude::*;
use pidguard::{EquipmentType, ProductType};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn check_fixture(name: &str) -> CheckReport {
    Checker::new()
        .check_file(&fixture_path(name), &CheckOptions::default())
        .expect("fixture should check successfully")
}

#[test]
fn test_compliant_drawing_has_no_violations() {
    let report = check_fixture("compliant_ecs.json");

    assert!(
        report.violations.is_empty(),
        "Compliant drawing should have no violations: {:?}",
        report
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.rule_id, v.description))
            .collect::<Vec<_>>()
    );
    assert_eq!(report.summary.equipment_found, 11);
    assert_eq!(report.summary.product_type, Some(ProductType::Ecs));
    // BWMS-009 is HYCHLOR only.
    assert_eq!(report.summary.builtin_rules_checked, 8);
    assert_eq!(report.summary.rules_checked, 8);
}

#[test]
fn test_ocr_duplicates_are_suppressed() {
    let report = check_fixture("compliant_ecs.json");
    let by_type = &report.summary.equipment_by_type;
    assert_eq!(by_type.get(&EquipmentType::Ecu), Some(&1));
    assert_eq!(by_type.get(&EquipmentType::Tsu), Some(&1));
}

#[test]
fn test_no_equipment_yields_empty_report() {
    let report = check_fixture("empty_drawing.json");
    assert!(report.violations.is_empty());
    assert_eq!(report.summary.equipment_found, 0);
    assert_eq!(report.summary.rules_checked, 0);
    assert!(report.summary.equipment_by_type.is_empty());
}

#[test]
fn test_sampling_port_upstream_of_ecu() {
    let report = check_fixture("sampling_port_upstream.json");

    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.rule_id, "BWMS-001");
    assert_eq!(v.severity, Severity::Error);
    assert_eq!(v.affected_elements, vec!["port", "ecu"]);
    assert_eq!(report.summary.errors, 1);
    assert!(report.has_errors());
}

#[test]
fn test_tsu_too_far_from_sampling_pump() {
    let report = check_fixture("tsu_far_from_apu.json");

    let distance: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.rule_id == "BWMS-004")
        .collect();
    assert_eq!(distance.len(), 1);
    assert!(distance[0].description.contains("6.0 m"));

    // Known scale of 200 px/m puts them 3 m apart.
    let scaled = Checker::new()
        .check_file(
            &fixture_path("tsu_far_from_apu.json"),
            &CheckOptions {
                scale_px_per_m: Some(200.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(scaled.violations.is_empty());
}

#[test]
fn test_mixing_pump_without_ballast_capacity_is_skipped() {
    let report = check_fixture("mixing_pump_text_only.json");
    assert_eq!(report.summary.equipment_found, 1);
    assert!(report.violations.is_empty());
}

fn pump_pair(ballast: &str, mixing: &str) -> serde_json::Value {
    serde_json::json!({
        "symbols": [
            {"id": "bp", "label": ballast, "x": 0, "y": 0, "width": 40, "height": 40},
            {"id": "mp", "label": mixing, "x": 200, "y": 0, "width": 20, "height": 20}
        ]
    })
}

#[test]
fn test_thousands_separated_capacity_is_not_misread() {
    let checker = Checker::new();
    let opts = CheckOptions::default();

    let report = checker
        .run_all_json(
            &pump_pair("BALLAST PUMP 1,500 m3/h", "MIXING PUMP 150 m3/h"),
            &opts,
        )
        .unwrap();
    assert_eq!(report.summary.equipment_found, 2);
    assert!(report.violations.is_empty(), "{:?}", report.violations);

    // 300 m3/h against 1,500 m3/h is 20%, outside the band.
    let report = checker
        .run_all_json(
            &pump_pair("BALLAST PUMP 1,500 m3/h", "MIXING PUMP 300 m3/h"),
            &opts,
        )
        .unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].rule_id, "BWMS-005");
    assert!(report.violations[0].description.contains("1500 m3/h"));
}

#[test]
fn test_hychlor_drawing_from_loose_shapes() {
    let report = check_fixture("hychlor_loose.json");

    assert_eq!(report.summary.product_type, Some(ProductType::Hychlor));
    assert_eq!(report.summary.equipment_found, 5);
    // ANU left of ECU would break BWMS-008, but that rule is ECS only.
    assert!(report.violations.is_empty(), "{:?}", report.violations);
    assert_eq!(report.summary.builtin_rules_checked, 8);
}

#[test]
fn test_degas_tank_without_hgu_path() {
    let payload = serde_json::json!({
        "symbols": [
            {"id": "hgu", "label": "HGU", "x": 100, "y": 0, "width": 20, "height": 20},
            {"id": "sc", "label": "SEA CHEST", "x": 0, "y": 0, "width": 20, "height": 20},
            {"id": "dgt", "label": "DEGAS TANK", "x": 300, "y": 0, "width": 20, "height": 20}
        ],
        "connections": [{"from": "sc", "to": "dgt"}]
    });
    let report = Checker::new()
        .run_all_json(&payload, &CheckOptions::default())
        .unwrap();

    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].rule_id, "BWMS-009");
}

#[test]
fn test_flow_edges_are_mirrored() {
    let checker = Checker::new();
    let input = DrawingInput::from_json_str(
        &std::fs::read_to_string(fixture_path("compliant_ecs.json")).unwrap(),
    )
    .unwrap();
    let graph = checker.build_graph(&input);

    for e in graph.equipment() {
        for d in &e.downstream {
            let target = graph.get(d).expect("downstream id must exist");
            assert!(target.upstream.contains(&e.id));
        }
        for u in &e.upstream {
            let source = graph.get(u).expect("upstream id must exist");
            assert!(source.downstream.contains(&e.id));
        }
    }
}

#[test]
fn test_runs_are_idempotent() {
    let checker = Checker::new();
    let path = fixture_path("sampling_port_upstream.json");
    let a = checker.check_file(&path, &CheckOptions::default()).unwrap();
    let b = checker.check_file(&path, &CheckOptions::default()).unwrap();

    assert_eq!(a.violations, b.violations);
    assert_eq!(a.summary, b.summary);
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn test_structurally_invalid_payload_fails() {
    let checker = Checker::new();
    let result = checker.run_all_json(
        &serde_json::json!({"symbols": {"id": "not-a-list"}}),
        &CheckOptions::default(),
    );
    assert!(matches!(result, Err(PidGuardError::InvalidInput(_))));

    let missing_position = checker.run_all_json(
        &serde_json::json!({"symbols": [{"id": "s1", "label": "ECU"}]}),
        &CheckOptions::default(),
    );
    assert!(matches!(missing_position, Err(PidGuardError::InvalidInput(_))));
}

#[test]
fn test_report_serializes() {
    let report = check_fixture("sampling_port_upstream.json");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["violations"][0]["rule_id"], "BWMS-001");
    assert_eq!(json["violations"][0]["severity"], "error");
    assert_eq!(json["summary"]["equipment_by_type"]["SAMPLING_PORT"], 1);
}

#[test]
fn test_check_drawing_convenience() {
    let report = pidguard::check_drawing(&fixture_path("sampling_port_upstream.json")).unwrap();
    assert_eq!(report.total_violations(), 1);
}
