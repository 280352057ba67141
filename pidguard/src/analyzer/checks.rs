use crate::analyzer::rules::{CheckContext, Rule, Violation};
use crate::catalogue::patterns::ValveKind;
use crate::flow::schema::{Equipment, EquipmentType};
use crate::rules::definition::RuleDefinition;

/// Which side of the reference the anchor must sit on, left to right being
/// the flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Upstream,
    Downstream,
}

/// Ratio used when the catalogue record carries no usable threshold.
const DEFAULT_MIXING_RATIO: f64 = 0.1;

/// Distance used when the catalogue record carries no usable threshold.
const DEFAULT_MAX_DISTANCE_M: f64 = 5.0;

// Helper functions

fn describe(e: &Equipment) -> String {
    if e.label.is_empty() || e.label.eq_ignore_ascii_case(e.equipment_type.code()) {
        format!("{} {}", e.equipment_type, e.id)
    } else {
        format!("{} '{}' ({})", e.equipment_type, e.label, e.id)
    }
}

/// Pairwise horizontal comparison. A pair on the same x never violates.
fn check_side(
    ctx: &CheckContext<'_>,
    definition: &RuleDefinition,
    anchor_type: EquipmentType,
    reference_type: EquipmentType,
    side: Side,
) -> Vec<Violation> {
    let anchors = ctx.graph.of_type(anchor_type);
    let references = ctx.graph.of_type(reference_type);
    let mut violations = Vec::new();

    for anchor in &anchors {
        for reference in &references {
            let wrong_side = match side {
                Side::Downstream => anchor.x < reference.x,
                Side::Upstream => anchor.x > reference.x,
            };
            if !wrong_side {
                continue;
            }
            let expected = match side {
                Side::Downstream => "downstream (right) of",
                Side::Upstream => "upstream (left) of",
            };
            violations.push(
                Violation::new(
                    definition,
                    format!(
                        "{} at x={:.0} is not {} {} at x={:.0}",
                        describe(anchor),
                        anchor.x,
                        expected,
                        describe(reference),
                        reference.x
                    ),
                )
                .at(anchor.position())
                .affecting([anchor.id.as_str(), reference.id.as_str()]),
            );
        }
    }
    violations
}

/// Each anchor needs at least one reference feeding it. When the anchor has
/// recorded inlets, `is_upstream` decides from the graph; otherwise a
/// reference to the left is accepted.
fn check_precedes<F>(
    ctx: &CheckContext<'_>,
    definition: &RuleDefinition,
    anchor_type: EquipmentType,
    reference_type: EquipmentType,
    is_upstream: F,
) -> Vec<Violation>
where
    F: Fn(&Equipment, &Equipment) -> bool,
{
    let references = ctx.graph.of_type(reference_type);
    if references.is_empty() {
        return Vec::new();
    }

    let mut violations = Vec::new();
    for anchor in ctx.graph.of_type(anchor_type) {
        let mut affected = vec![anchor.id.clone()];
        affected.extend(references.iter().map(|r| r.id.clone()));

        if anchor.has_upstream_edges() {
            if references.iter().any(|&r| is_upstream(r, anchor)) {
                continue;
            }
            violations.push(
                Violation::new(
                    definition,
                    format!(
                        "{} is connected, but no {} feeds it (inlets: {})",
                        describe(anchor),
                        reference_type,
                        anchor.upstream.join(", ")
                    ),
                )
                .at(anchor.position())
                .affecting(affected),
            );
        } else {
            if references.iter().any(|r| r.x < anchor.x) {
                continue;
            }
            let suggestion = format!(
                "{} (no connections recorded for {}; judged by drawing position)",
                definition.suggestion, anchor.id
            );
            violations.push(
                Violation::new(
                    definition,
                    format!(
                        "No {} is drawn left of {} at x={:.0}",
                        reference_type,
                        describe(anchor),
                        anchor.x
                    ),
                )
                .at(anchor.position())
                .affecting(affected)
                .with_suggestion(suggestion.trim_start()),
            );
        }
    }
    violations
}

/// Each lower unit needs an upper unit above it (smaller y) within the
/// horizontal alignment tolerance.
fn check_above(
    ctx: &CheckContext<'_>,
    definition: &RuleDefinition,
    upper_type: EquipmentType,
    lower_type: EquipmentType,
) -> Vec<Violation> {
    let uppers = ctx.graph.of_type(upper_type);
    if uppers.is_empty() {
        return Vec::new();
    }
    let tolerance = ctx.calibration.alignment_tolerance_px;
    let mut violations = Vec::new();

    for lower in ctx.graph.of_type(lower_type) {
        let aligned = uppers
            .iter()
            .any(|u| u.y < lower.y && (u.x - lower.x).abs() < tolerance);
        if aligned {
            continue;
        }

        let nearest = uppers
            .iter()
            .min_by(|a, b| a.distance_to(lower).total_cmp(&b.distance_to(lower)));
        let Some(nearest) = nearest else { continue };

        let mut reasons = Vec::new();
        if nearest.y >= lower.y {
            reasons.push(format!("it is not above (y={:.0} vs {:.0})", nearest.y, lower.y));
        }
        let dx = (nearest.x - lower.x).abs();
        if dx >= tolerance {
            reasons.push(format!(
                "horizontal offset {:.0}px exceeds {:.0}px",
                dx, tolerance
            ));
        }
        violations.push(
            Violation::new(
                definition,
                format!(
                    "{} is not directly above {}: {}",
                    describe(nearest),
                    describe(lower),
                    reasons.join(" and ")
                ),
            )
            .at(nearest.position())
            .affecting([nearest.id.as_str(), lower.id.as_str()]),
        );
    }
    violations
}

fn check_max_distance(
    ctx: &CheckContext<'_>,
    definition: &RuleDefinition,
    from_type: EquipmentType,
    to_type: EquipmentType,
) -> Vec<Violation> {
    let targets = ctx.graph.of_type(to_type);
    if targets.is_empty() {
        return Vec::new();
    }
    let limit_m = definition.threshold().unwrap_or(DEFAULT_MAX_DISTANCE_M);
    let (px_per_m, assumed) = ctx.px_per_m();
    let mut violations = Vec::new();

    for from in ctx.graph.of_type(from_type) {
        let nearest = targets
            .iter()
            .min_by(|a, b| a.distance_to(from).total_cmp(&b.distance_to(from)));
        let Some(nearest) = nearest else { continue };

        let distance_m = from.distance_to(nearest) / px_per_m;
        if distance_m <= limit_m {
            continue;
        }

        let mut suggestion = definition.suggestion.clone();
        if assumed {
            suggestion.push_str(&format!(
                " Distance estimated at an assumed scale of {} px/m; \
                 confirm on the arrangement drawing.",
                px_per_m
            ));
        }
        violations.push(
            Violation::new(
                definition,
                format!(
                    "{} is {:.1} m from nearest {}, limit is {} m",
                    describe(from),
                    distance_m,
                    describe(nearest),
                    limit_m
                ),
            )
            .at(from.position())
            .affecting([from.id.as_str(), nearest.id.as_str()])
            .with_suggestion(suggestion.trim_start()),
        );
    }
    violations
}

/// `numerator / denominator` must be within the calibrated relative
/// tolerance of the rule threshold. Skipped when either capacity is unknown.
fn check_capacity_ratio(
    ctx: &CheckContext<'_>,
    definition: &RuleDefinition,
    numerator_type: EquipmentType,
    denominator_type: EquipmentType,
) -> Vec<Violation> {
    let (Some(numerator), Some(denominator)) = (
        ctx.capacity_of(numerator_type),
        ctx.capacity_of(denominator_type),
    ) else {
        tracing::debug!(
            "{}: capacity of {} or {} not found, skipping",
            definition.id,
            numerator_type,
            denominator_type
        );
        return Vec::new();
    };
    if denominator <= 0.0 {
        return Vec::new();
    }

    let target = definition.threshold().unwrap_or(DEFAULT_MIXING_RATIO);
    let ratio = numerator / denominator;
    let tolerance = ctx.calibration.capacity_tolerance;
    if ((ratio - target) / target).abs() <= tolerance {
        return Vec::new();
    }

    let numerator_units = ctx.graph.of_type(numerator_type);
    let mut violation = Violation::new(
        definition,
        format!(
            "{} capacity {} m3/h is {:.1}% of {} capacity {} m3/h, expected {:.1}% ±{:.0}%",
            numerator_type,
            numerator,
            ratio * 100.0,
            denominator_type,
            denominator,
            target * 100.0,
            tolerance * 100.0
        ),
    )
    .affecting(
        numerator_units
            .iter()
            .chain(ctx.graph.of_type(denominator_type).iter())
            .map(|e| e.id.clone())
            .collect::<Vec<_>>(),
    );
    if let Some(first) = numerator_units.first() {
        violation = violation.at(first.position());
    }
    vec![violation]
}

/// Valves of `kind` must sit inside the area spanned by the cluster,
/// expanded by the calibrated margin.
fn check_valves_in_cluster(
    ctx: &CheckContext<'_>,
    definition: &RuleDefinition,
    cluster_type: EquipmentType,
    kind: ValveKind,
) -> Vec<Violation> {
    let cluster = ctx.graph.of_type(cluster_type);
    let Some(area) = cluster
        .iter()
        .map(|e| e.bbox)
        .reduce(|a, b| a.union(&b))
        .map(|b| b.expand(ctx.calibration.cluster_margin_px))
    else {
        return Vec::new();
    };

    ctx.symbols
        .iter()
        .filter(|s| ctx.catalogue.classify_valve_symbol(s) == Some(kind))
        .filter(|s| !area.contains(&s.position))
        .map(|valve| {
            Violation::new(
                definition,
                format!(
                    "{:?} valve {} at ({:.0}, {:.0}) lies outside the {} area",
                    kind, valve.id, valve.position.x, valve.position.y, cluster_type
                ),
            )
            .at(valve.position)
            .affecting([valve.id.as_str()])
        })
        .collect()
}

/// Each anchor needs a reference on the same process line (within the
/// calibrated y band) that feeds it.
fn check_inlet_on_line(
    ctx: &CheckContext<'_>,
    definition: &RuleDefinition,
    anchor_type: EquipmentType,
    reference_type: EquipmentType,
) -> Vec<Violation> {
    let references = ctx.graph.of_type(reference_type);
    if references.is_empty() {
        return Vec::new();
    }
    let band = ctx.calibration.y_band_px;
    let mut violations = Vec::new();

    for anchor in ctx.graph.of_type(anchor_type) {
        let on_line: Vec<&Equipment> = references
            .iter()
            .copied()
            .filter(|r| (r.y - anchor.y).abs() <= band)
            .collect();
        let qualifies = |r: &Equipment| {
            if anchor.has_upstream_edges() {
                ctx.graph.is_direct_upstream(&r.id, &anchor.id)
            } else {
                r.x < anchor.x
            }
        };
        if on_line.iter().any(|&r| qualifies(r)) {
            continue;
        }

        let description = if on_line.is_empty() {
            format!(
                "No {} on the process line of {} (within {:.0}px vertically)",
                reference_type,
                describe(anchor),
                band
            )
        } else {
            format!(
                "{} on the process line of {} is not on its inlet side",
                reference_type,
                describe(anchor)
            )
        };
        let mut affected = vec![anchor.id.clone()];
        affected.extend(on_line.iter().map(|r| r.id.clone()));
        violations.push(
            Violation::new(definition, description)
                .at(anchor.position())
                .affecting(affected),
        );
    }
    violations
}

// Rule implementations

pub struct SamplingPortDownstreamRule;

impl Rule for SamplingPortDownstreamRule {
    fn id(&self) -> &str {
        "BWMS-001"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_side(
            ctx,
            definition,
            EquipmentType::SamplingPort,
            EquipmentType::Ecu,
            Side::Downstream,
        )
    }
}

pub struct FilterUpstreamRule;

impl Rule for FilterUpstreamRule {
    fn id(&self) -> &str {
        "BWMS-002"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_precedes(
            ctx,
            definition,
            EquipmentType::Ecu,
            EquipmentType::Filter,
            |reference, anchor| ctx.graph.is_direct_upstream(&reference.id, &anchor.id),
        )
    }
}

pub struct GasDetectorAboveEcuRule;

impl Rule for GasDetectorAboveEcuRule {
    fn id(&self) -> &str {
        "BWMS-003"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_above(ctx, definition, EquipmentType::Gds, EquipmentType::Ecu)
    }
}

pub struct TsuSamplingDistanceRule;

impl Rule for TsuSamplingDistanceRule {
    fn id(&self) -> &str {
        "BWMS-004"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_max_distance(ctx, definition, EquipmentType::Tsu, EquipmentType::Apu)
    }
}

pub struct MixingPumpCapacityRule;

impl Rule for MixingPumpCapacityRule {
    fn id(&self) -> &str {
        "BWMS-005"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_capacity_ratio(
            ctx,
            definition,
            EquipmentType::MixingPump,
            EquipmentType::BallastPump,
        )
    }
}

pub struct IsolationValveAreaRule;

impl Rule for IsolationValveAreaRule {
    fn id(&self) -> &str {
        "BWMS-006"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_valves_in_cluster(ctx, definition, EquipmentType::Ecu, ValveKind::Isolation)
    }
}

pub struct FlowMeterInletRule;

impl Rule for FlowMeterInletRule {
    fn id(&self) -> &str {
        "BWMS-007"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_inlet_on_line(ctx, definition, EquipmentType::Ecu, EquipmentType::Fmu)
    }
}

pub struct NeutralisationDownstreamRule;

impl Rule for NeutralisationDownstreamRule {
    fn id(&self) -> &str {
        "BWMS-008"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_side(
            ctx,
            definition,
            EquipmentType::Anu,
            EquipmentType::Ecu,
            Side::Downstream,
        )
    }
}

pub struct DegasTankAfterHguRule;

impl Rule for DegasTankAfterHguRule {
    fn id(&self) -> &str {
        "BWMS-009"
    }

    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation> {
        check_precedes(
            ctx,
            definition,
            EquipmentType::DegasTank,
            EquipmentType::Hgu,
            |reference, anchor| ctx.graph.has_flow_path(&reference.id, &anchor.id),
        )
    }
}
