//! Dynamic rule table
//!
//! The only state that outlives a single validation run. Writers (upload,
//! enable/disable, delete) take the write lock; a run holds the read lock for
//! its whole dynamic phase so it never sees a half-replaced rule set.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::compiled::CompiledRule;
use super::definition::RuleDefinition;
use super::loader::RuleRecord;
use super::RuleError;

/// Outcome of a bulk upload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// (rule id or row number, reason)
    pub skipped: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct RuleTable {
    rules: RwLock<BTreeMap<String, CompiledRule>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, CompiledRule>> {
        // Mutations are single inserts/removes or a whole-map swap, so a
        // poisoned lock still guards a consistent map.
        self.rules.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, CompiledRule>> {
        self.rules.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a single rule.
    pub fn upsert(&self, definition: RuleDefinition) -> Result<(), RuleError> {
        let compiled = CompiledRule::compile(definition)?;
        let id = compiled.id().to_string();
        if self.write().insert(id.clone(), compiled).is_some() {
            tracing::debug!("Replaced dynamic rule {}", id);
        }
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<RuleDefinition> {
        self.write().remove(id).map(|r| r.definition)
    }

    /// Toggle a rule without removing it. Returns false for unknown ids.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        match self.write().get_mut(id) {
            Some(rule) => {
                rule.definition.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Keyed replace of the whole table. Bad rows are skipped and reported.
    pub fn replace_all(&self, records: Vec<RuleRecord>) -> LoadReport {
        let mut report = LoadReport::default();
        let mut next = BTreeMap::new();

        for (row, record) in records.into_iter().enumerate() {
            let label = if record.id.trim().is_empty() {
                format!("row {}", row + 1)
            } else {
                record.id.trim().to_string()
            };

            match RuleDefinition::try_from(record).and_then(CompiledRule::compile) {
                Ok(compiled) => {
                    report.loaded.push(compiled.id().to_string());
                    next.insert(compiled.id().to_string(), compiled);
                }
                Err(e) => {
                    tracing::warn!("Skipping dynamic rule {}: {}", label, e);
                    report.skipped.push((label, e.to_string()));
                }
            }
        }

        *self.write() = next;
        tracing::info!(
            "Dynamic rule table replaced: {} loaded, {} skipped",
            report.loaded.len(),
            report.skipped.len()
        );
        report
    }

    pub fn get(&self, id: &str) -> Option<RuleDefinition> {
        self.read().get(id).map(|r| r.definition.clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, check_type: &str) -> RuleRecord {
        RuleRecord {
            id: id.to_string(),
            check_type: check_type.to_string(),
            equipment: "ECU".to_string(),
            condition: "required".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_replace_all_skips_bad_rows() {
        let table = RuleTable::new();
        let report = table.replace_all(vec![
            record("B", "existence"),
            record("A", "existence"),
            record("C", "telepathy"),
            RuleRecord {
                equipment: "(((".to_string(),
                ..record("D", "existence")
            },
            record("", "existence"),
        ]);
        assert_eq!(report.loaded, vec!["B", "A"]);
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(report.skipped[2].0, "row 5");
        assert_eq!(table.ids(), vec!["A", "B"]);
    }

    #[test]
    fn test_replace_is_keyed_not_merged() {
        let table = RuleTable::new();
        table.replace_all(vec![record("A", "existence")]);
        table.replace_all(vec![record("B", "existence")]);
        assert_eq!(table.ids(), vec!["B"]);
    }

    #[test]
    fn test_enable_disable_and_remove() {
        let table = RuleTable::new();
        table.replace_all(vec![record("A", "existence")]);
        assert!(table.set_enabled("A", false));
        assert!(!table.get("A").unwrap().enabled);
        assert!(!table.set_enabled("missing", false));
        assert!(table.remove("A").is_some());
        assert!(table.is_empty());
    }
}
