//! Equipment and valve tag patterns
//!
//! Patterns are matched case-insensitively. Each entry carries an explicit
//! `priority`; the catalogue is sorted on construction and the first matching
//! entry wins, so overlapping patterns (e.g. "SAMPLING PORT" vs
//! "SAMPLING PUMP") resolve the same way regardless of the order they were
//! declared or deserialised in.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::CatalogueError;
use crate::flow::schema::EquipmentType;
use crate::parser::schema::Symbol;

/// Valve categories recognised from symbol tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValveKind {
    Bypass,
    Check,
    Control,
    Sampling,
    Isolation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec<K> {
    /// Lower value = tried first. Must be unique within a catalogue.
    pub priority: u32,
    pub kind: K,
    pub pattern: String,
}

impl<K> PatternSpec<K> {
    fn new(priority: u32, kind: K, pattern: &str) -> Self {
        Self {
            priority,
            kind,
            pattern: pattern.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledPattern<K> {
    priority: u32,
    kind: K,
    regex: Regex,
}

/// On-disk shape of a user supplied catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogueFile {
    #[serde(default)]
    pub equipment: Vec<PatternSpec<EquipmentType>>,
    #[serde(default)]
    pub valves: Vec<PatternSpec<ValveKind>>,
}

#[derive(Debug, Clone)]
pub struct PatternCatalogue {
    equipment: Vec<CompiledPattern<EquipmentType>>,
    valves: Vec<CompiledPattern<ValveKind>>,
}

static BUILTIN: Lazy<PatternCatalogue> = Lazy::new(|| {
    PatternCatalogue::from_specs(builtin_equipment_specs(), builtin_valve_specs())
        .expect("built-in tag patterns must compile")
});

fn builtin_equipment_specs() -> Vec<PatternSpec<EquipmentType>> {
    use EquipmentType::*;
    vec![
        PatternSpec::new(10, SamplingPort, r"SAMPLING\s*(?:PORT|POINT)|\bSP[-_ ]?\d+\b"),
        PatternSpec::new(20, Apu, r"\bAPU[-_ ]?\d*\b|SAMPLING\s*PUMP"),
        PatternSpec::new(30, MixingPump, r"MIXING\s*PUMP|\bMXP[-_ ]?\d*\b"),
        PatternSpec::new(40, BallastPump, r"BALLAST\s*(?:WATER\s*)?PUMP|\bBWP[-_ ]?\d*\b"),
        PatternSpec::new(50, BallastTank, r"BALLAST\s*(?:WATER\s*)?TANK"),
        PatternSpec::new(60, Ecu, r"\bECU[-_ ]?\d*\b|ELECTRO[- ]?(?:CHEMICAL\s*)?CHAMBER"),
        PatternSpec::new(70, Pru, r"\bPRU[-_ ]?\d*\b|RECTIFIER"),
        PatternSpec::new(80, Hgu, r"\bHGU[-_ ]?\d*\b|HYPOCHLORITE\s*GEN"),
        PatternSpec::new(90, Anu, r"\bANU[-_ ]?\d*\b|NEUTRALI[SZ]"),
        PatternSpec::new(100, Tsu, r"\bTSU[-_ ]?\d*\b|TRO\s*SENSOR"),
        PatternSpec::new(110, Gds, r"\bGDS[-_ ]?\d*\b|GAS\s*DETECT"),
        PatternSpec::new(120, Fmu, r"\bFMU[-_ ]?\d*\b|FLOW\s*METER|\bFT[-_ ]?\d+\b"),
        PatternSpec::new(130, Csu, r"\bCSU[-_ ]?\d*\b|SALINITY|CONDUCTIVITY"),
        PatternSpec::new(140, DegasTank, r"DE-?GAS(?:SING)?\s*TANK|\bDGT[-_ ]?\d*\b"),
        PatternSpec::new(150, Filter, r"\bFILTER\b|\bFLT[-_ ]?\d*\b"),
        PatternSpec::new(160, Strainer, r"STRAINER|\bSTR[-_ ]?\d+\b"),
        PatternSpec::new(170, Blower, r"\bBLOWER\b|\bFAN[-_ ]?\d*\b"),
        PatternSpec::new(180, ControlPanel, r"CONTROL\s*PANEL|\bCPC\b"),
        PatternSpec::new(190, SeaChest, r"SEA\s*CHEST"),
        PatternSpec::new(200, Overboard, r"OVER\s*BOARD|\bO\.?B\.?D\b"),
    ]
}

fn builtin_valve_specs() -> Vec<PatternSpec<ValveKind>> {
    use ValveKind::*;
    vec![
        PatternSpec::new(10, Bypass, r"BY-?PASS|\bBPV[-_ ]?\d*\b"),
        PatternSpec::new(20, Check, r"CHECK\s*VALVE|\bNRV[-_ ]?\d*\b"),
        PatternSpec::new(30, Control, r"CONTROL\s*VALVE|\bF?CV[-_ ]?\d+\b"),
        PatternSpec::new(40, Sampling, r"SAMPLING\s*VALVE|\bSV[-_ ]?\d+\b"),
        PatternSpec::new(50, Isolation, r"ISOLATION\s*VALVE|\bBV[-_ ]?\d+\b"),
    ]
}

fn compile<K: Copy>(
    specs: Vec<PatternSpec<K>>,
) -> Result<Vec<CompiledPattern<K>>, CatalogueError> {
    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(specs.len());

    for spec in specs {
        if !seen.insert(spec.priority) {
            return Err(CatalogueError::DuplicatePriority(spec.priority));
        }
        let regex = RegexBuilder::new(&spec.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CatalogueError::InvalidPattern {
                pattern: spec.pattern.clone(),
                source,
            })?;
        compiled.push(CompiledPattern {
            priority: spec.priority,
            kind: spec.kind,
            regex,
        });
    }

    compiled.sort_by_key(|p| p.priority);
    Ok(compiled)
}

impl PatternCatalogue {
    /// The BWMS catalogue compiled into the engine.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn from_specs(
        equipment: Vec<PatternSpec<EquipmentType>>,
        valves: Vec<PatternSpec<ValveKind>>,
    ) -> Result<Self, CatalogueError> {
        Ok(Self {
            equipment: compile(equipment)?,
            valves: compile(valves)?,
        })
    }

    /// Load a catalogue from JSON. Missing sections fall back to the built-in ones.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogueError> {
        let file: CatalogueFile = serde_json::from_str(json)?;
        let equipment = if file.equipment.is_empty() {
            builtin_equipment_specs()
        } else {
            file.equipment
        };
        let valves = if file.valves.is_empty() {
            builtin_valve_specs()
        } else {
            file.valves
        };
        Self::from_specs(equipment, valves)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CatalogueError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Classify free text. First pattern in priority order wins.
    pub fn classify(&self, text: &str) -> Option<EquipmentType> {
        self.equipment
            .iter()
            .find(|p| p.regex.is_match(text))
            .map(|p| p.kind)
    }

    /// Classify a detector symbol by label, class and tag number.
    pub fn classify_symbol(&self, symbol: &Symbol) -> Option<EquipmentType> {
        self.equipment
            .iter()
            .find(|p| symbol.match_fields().any(|field| p.regex.is_match(field)))
            .map(|p| p.kind)
    }

    pub fn classify_valve_symbol(&self, symbol: &Symbol) -> Option<ValveKind> {
        self.valves
            .iter()
            .find(|p| symbol.match_fields().any(|field| p.regex.is_match(field)))
            .map(|p| p.kind)
    }

    /// Equipment types in matching order, with their patterns.
    pub fn equipment_patterns(&self) -> impl Iterator<Item = (u32, EquipmentType, &str)> {
        self.equipment
            .iter()
            .map(|p| (p.priority, p.kind, p.regex.as_str()))
    }
}

impl Default for PatternCatalogue {
    fn default() -> Self {
        Self::builtin()
    }
}
