//! Equipment Identifier
//!
//! Turns detector symbols and OCR fragments into typed equipment nodes.
//! Symbols are classified first and keep their detector id. OCR fragments
//! are scanned independently; a hit is dropped when a symbol-derived unit
//! already sits within the de-duplication radius, since detector and OCR
//! frequently report the same physical unit. OCR hits are not de-duplicated
//! against each other.

use crate::catalogue::patterns::PatternCatalogue;
use crate::flow::schema::{Equipment, EquipmentSource};
use crate::parser::schema::{Symbol, TextFragment};

pub struct EquipmentIdentifier<'a> {
    catalogue: &'a PatternCatalogue,
    dedup_radius_px: f64,
}

impl<'a> EquipmentIdentifier<'a> {
    pub fn new(catalogue: &'a PatternCatalogue, dedup_radius_px: f64) -> Self {
        Self {
            catalogue,
            dedup_radius_px,
        }
    }

    pub fn identify(&self, symbols: &[Symbol], texts: &[TextFragment]) -> Vec<Equipment> {
        let mut identified: Vec<Equipment> = symbols
            .iter()
            .filter_map(|s| self.from_symbol(s))
            .collect();
        let from_symbols = identified.len();

        for (n, fragment) in texts.iter().enumerate() {
            let Some(equipment_type) = self.catalogue.classify(&fragment.text) else {
                continue;
            };
            let candidate = Equipment::new(
                format!("text_{}", n),
                equipment_type,
                fragment.text.clone(),
                fragment.bbox,
                EquipmentSource::Ocr,
            );

            let duplicate = identified[..from_symbols]
                .iter()
                .find(|e| e.distance_to(&candidate) < self.dedup_radius_px);
            match duplicate {
                Some(existing) => tracing::debug!(
                    "OCR '{}' suppressed as duplicate of {} ({})",
                    fragment.text,
                    existing.id,
                    existing.equipment_type
                ),
                None => identified.push(candidate),
            }
        }

        tracing::debug!(
            "Identified {} equipment ({} from symbols, {} from OCR)",
            identified.len(),
            from_symbols,
            identified.len() - from_symbols
        );
        identified
    }

    fn from_symbol(&self, symbol: &Symbol) -> Option<Equipment> {
        let equipment_type = self.catalogue.classify_symbol(symbol)?;
        let label = if symbol.label.is_empty() {
            symbol.tag_number.clone().unwrap_or_default()
        } else {
            symbol.label.clone()
        };
        Some(
            Equipment::new(
                symbol.id.clone(),
                equipment_type,
                label,
                symbol.bbox,
                EquipmentSource::Symbol,
            )
            .at(symbol.position),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::schema::EquipmentType;
    use crate::parser::schema::{BBox, Position};

    fn symbol(id: &str, label: &str, x: f64, y: f64) -> Symbol {
        Symbol {
            id: id.to_string(),
            label: label.to_string(),
            class: None,
            tag_number: None,
            position: Position::new(x, y),
            width: 40.0,
            height: 40.0,
            bbox: BBox::from_center(Position::new(x, y), 40.0, 40.0),
            confidence: None,
        }
    }

    fn text(s: &str, cx: f64, cy: f64) -> TextFragment {
        TextFragment::new(s, BBox::from_center(Position::new(cx, cy), 60.0, 12.0))
    }

    #[test]
    fn test_empty_inputs() {
        let cat = PatternCatalogue::builtin();
        let id = EquipmentIdentifier::new(&cat, 100.0);
        assert!(id.identify(&[], &[]).is_empty());
    }

    #[test]
    fn test_symbols_keep_detector_ids_and_unmatched_ignored() {
        let cat = PatternCatalogue::builtin();
        let id = EquipmentIdentifier::new(&cat, 100.0);
        let eq = id.identify(
            &[symbol("sym-1", "ECU", 10.0, 20.0), symbol("sym-2", "ELBOW", 0.0, 0.0)],
            &[],
        );
        assert_eq!(eq.len(), 1);
        assert_eq!(eq[0].id, "sym-1");
        assert_eq!(eq[0].equipment_type, EquipmentType::Ecu);
        assert_eq!((eq[0].x, eq[0].y), (10.0, 20.0));
        assert_eq!(eq[0].source, EquipmentSource::Symbol);
    }

    #[test]
    fn test_ocr_near_symbol_is_suppressed() {
        let cat = PatternCatalogue::builtin();
        let id = EquipmentIdentifier::new(&cat, 100.0);
        let eq = id.identify(
            &[symbol("s1", "ECU", 100.0, 100.0)],
            &[text("ECU-1", 150.0, 100.0), text("TSU", 600.0, 100.0)],
        );
        assert_eq!(eq.len(), 2);
        assert_eq!(eq[1].id, "text_1");
        assert_eq!(eq[1].equipment_type, EquipmentType::Tsu);
        assert_eq!((eq[1].x, eq[1].y), (600.0, 100.0));
    }

    #[test]
    fn test_ocr_hits_not_deduplicated_against_each_other() {
        let cat = PatternCatalogue::builtin();
        let id = EquipmentIdentifier::new(&cat, 100.0);
        let eq = id.identify(&[], &[text("GDS", 0.0, 0.0), text("GDS-1", 10.0, 0.0)]);
        let ids: Vec<&str> = eq.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["text_0", "text_1"]);
    }
}
