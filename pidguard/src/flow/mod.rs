//! Flow graph over identified equipment
//!
//! `schema` holds the equipment node model, `graph` the directed
//! adjacency structure the checks read.

pub mod graph;
pub mod schema;

pub use graph::FlowGraph;
pub use schema::{Equipment, EquipmentSource, EquipmentType};
