//! Equipment nodes of the flow graph

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::parser::schema::{BBox, Position};

/// Coded BWMS equipment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentType {
    /// Electrolysis chamber unit
    Ecu,
    /// Power rectifier unit
    Pru,
    /// Hypochlorite generation unit (HYCHLOR side-stream line)
    Hgu,
    /// Auto neutralisation unit
    Anu,
    /// TRO sensor unit
    Tsu,
    /// Gas detection sensor
    Gds,
    /// Flow meter unit
    Fmu,
    /// Conductivity / salinity sensor unit
    Csu,
    /// TRO analyser sampling pump unit
    Apu,
    DegasTank,
    MixingPump,
    BallastPump,
    Filter,
    Strainer,
    SamplingPort,
    ControlPanel,
    Blower,
    SeaChest,
    Overboard,
    BallastTank,
}

impl EquipmentType {
    pub const ALL: [EquipmentType; 20] = [
        EquipmentType::Ecu,
        EquipmentType::Pru,
        EquipmentType::Hgu,
        EquipmentType::Anu,
        EquipmentType::Tsu,
        EquipmentType::Gds,
        EquipmentType::Fmu,
        EquipmentType::Csu,
        EquipmentType::Apu,
        EquipmentType::DegasTank,
        EquipmentType::MixingPump,
        EquipmentType::BallastPump,
        EquipmentType::Filter,
        EquipmentType::Strainer,
        EquipmentType::SamplingPort,
        EquipmentType::ControlPanel,
        EquipmentType::Blower,
        EquipmentType::SeaChest,
        EquipmentType::Overboard,
        EquipmentType::BallastTank,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            EquipmentType::Ecu => "ECU",
            EquipmentType::Pru => "PRU",
            EquipmentType::Hgu => "HGU",
            EquipmentType::Anu => "ANU",
            EquipmentType::Tsu => "TSU",
            EquipmentType::Gds => "GDS",
            EquipmentType::Fmu => "FMU",
            EquipmentType::Csu => "CSU",
            EquipmentType::Apu => "APU",
            EquipmentType::DegasTank => "DEGAS_TANK",
            EquipmentType::MixingPump => "MIXING_PUMP",
            EquipmentType::BallastPump => "BALLAST_PUMP",
            EquipmentType::Filter => "FILTER",
            EquipmentType::Strainer => "STRAINER",
            EquipmentType::SamplingPort => "SAMPLING_PORT",
            EquipmentType::ControlPanel => "CONTROL_PANEL",
            EquipmentType::Blower => "BLOWER",
            EquipmentType::SeaChest => "SEA_CHEST",
            EquipmentType::Overboard => "OVERBOARD",
            EquipmentType::BallastTank => "BALLAST_TANK",
        }
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EquipmentType {
    type Err = String;

    /// Accepts the type code in any case, with spaces or hyphens for underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        EquipmentType::ALL
            .iter()
            .copied()
            .find(|t| t.code() == normalized)
            .ok_or_else(|| format!("unknown equipment type '{}'", s))
    }
}

/// Where an equipment node was identified from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSource {
    Symbol,
    Ocr,
}

/// An identified piece of equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub equipment_type: EquipmentType,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub bbox: BBox,
    pub source: EquipmentSource,
    #[serde(default)]
    pub upstream: Vec<String>,
    #[serde(default)]
    pub downstream: Vec<String>,
    #[serde(default)]
    pub connected_to: Vec<String>,
}

impl Equipment {
    pub fn new(
        id: impl Into<String>,
        equipment_type: EquipmentType,
        label: impl Into<String>,
        bbox: BBox,
        source: EquipmentSource,
    ) -> Self {
        let center = bbox.center();
        Self {
            id: id.into(),
            equipment_type,
            label: label.into(),
            x: center.x,
            y: center.y,
            width: bbox.width(),
            height: bbox.height(),
            bbox,
            source,
            upstream: Vec::new(),
            downstream: Vec::new(),
            connected_to: Vec::new(),
        }
    }

    /// Override the centre when the detector reports one separately from its bbox.
    pub fn at(mut self, position: Position) -> Self {
        self.x = position.x;
        self.y = position.y;
        self
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn distance_to(&self, other: &Equipment) -> f64 {
        self.position().distance_to(&other.position())
    }

    pub fn has_upstream_edges(&self) -> bool {
        !self.upstream.is_empty()
    }
}
