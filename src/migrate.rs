//! Migration - bulk copy and move between the attribute store and scopes
//!
//! Every migration exports one ordered batch, writes it to the destination
//! inside one transaction and only then (for `Transfer::Move`) removes the
//! originals. A failed destination write removes nothing. A crash between the
//! destination commit and the source delete can leave the records in both
//! places.

use crate::attributes::{Attribute, AttributeStore};
use crate::codec;
use crate::query::PatternFilter;
use crate::scope::ScopeResolver;
use crate::storage::RawRecord;
use crate::store::{warn_on_hazard, VarStore};
use crate::value::ObjectId;
use crate::var_type::VarType;
use crate::world::World;
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;

/// Whether the source keeps its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Copy,
    Move,
}

/// Outcome of a migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Records matched at the source
    pub exported: usize,
    /// Records written at the destination
    pub written: usize,
    /// Matched records the destination cannot hold
    pub skipped: usize,
    /// Records removed from the source
    pub removed: usize,
}

impl std::fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "exported {}, written {}, skipped {}, removed {}",
            self.exported, self.written, self.skipped, self.removed
        )
    }
}

impl<W: World> VarStore<W> {
    /// Copy or move locals of `source` into the scope of `dest`, under `tag`.
    ///
    /// Only the filter's type mask and name glob apply; locals carry no tag
    /// or timestamp.
    pub fn copy_attributes_to_scope(
        &mut self,
        attrs: &mut dyn AttributeStore,
        source: ObjectId,
        dest: Option<ObjectId>,
        filter: &PatternFilter,
        tag: &str,
        transfer: Transfer,
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        let now = self.clock.now();
        warn_on_hazard("Migration", &format!("locals of {}", source), filter, transfer == Transfer::Move);

        let Some(table) = Self::table_for(&mut self.registry, &self.world, dest)? else {
            tracing::debug!("Migration destination {:?} is unrecognized", dest);
            return Ok(report);
        };

        let mut batch = Vec::new();
        let mut originals = Vec::new();
        for entry in attrs.entries(source) {
            let Some(var_type) = VarType::from_attribute_kind(entry.kind) else {
                report.skipped += 1;
                continue;
            };
            if !table.matches_entry(filter, var_type, &entry.name)? {
                continue;
            }
            report.exported += 1;

            let Some(value) = attrs
                .get(source, entry.kind, &entry.name)
                .and_then(Attribute::into_value)
            else {
                report.skipped += 1;
                continue;
            };
            batch.push(RawRecord {
                var_type,
                name: entry.name.clone(),
                tag: tag.to_string(),
                value: codec::encode(&value, &self.world)?,
                timestamp: now,
            });
            originals.push(entry);
        }

        report.written = table.upsert_batch(&batch)?;

        if transfer == Transfer::Move {
            for entry in &originals {
                attrs.delete(source, entry.kind, &entry.name);
            }
            report.removed = originals.len();
        }

        tracing::info!("Migrated locals of {} into {}: {}", source, table.table(), report);
        Ok(report)
    }

    /// Copy or move records of `source`'s scope onto the locals of `target`.
    ///
    /// Vector and serialized records have no local kind and are skipped. When
    /// one name is stored under several tags, tagged records land as
    /// `name@tag` and the untagged record keeps the bare name.
    pub fn copy_scope_to_attributes(
        &mut self,
        attrs: &mut dyn AttributeStore,
        source: Option<ObjectId>,
        target: ObjectId,
        filter: &PatternFilter,
        transfer: Transfer,
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        let Some(table) = Self::table_for(&mut self.registry, &self.world, source)? else {
            tracing::debug!("Migration source {:?} is unrecognized", source);
            return Ok(report);
        };
        warn_on_hazard("Migration", table.table(), filter, transfer == Transfer::Move);
        let records = table.select_pattern(filter)?;
        report.exported = records.len();

        let mut occurrences: HashMap<(VarType, &str), usize> = HashMap::new();
        for record in &records {
            *occurrences.entry((record.var_type, record.name.as_str())).or_default() += 1;
        }

        let mut staged = Vec::new();
        let mut exported = Vec::new();
        for record in &records {
            if record.var_type.attribute_kind().is_none() {
                report.skipped += 1;
                continue;
            }
            let value = codec::decode(record.var_type, record.value.clone(), &self.world)?;
            let Some(attribute) = Attribute::from_value(value) else {
                report.skipped += 1;
                continue;
            };
            let collides = occurrences[&(record.var_type, record.name.as_str())] > 1;
            let name = if collides && !record.tag.is_empty() {
                format!("{}@{}", record.name, record.tag)
            } else {
                record.name.clone()
            };
            staged.push((name, attribute));
            exported.push(record.clone());
        }

        for (name, attribute) in staged {
            attrs.set(target, &name, attribute);
            report.written += 1;
        }

        if transfer == Transfer::Move {
            let table = Self::table_for(&mut self.registry, &self.world, source)?;
            if let Some(table) = table {
                report.removed = table.delete_batch(&exported)?;
            }
        }

        tracing::info!("Migrated {:?} onto locals of {}: {}", source, target, report);
        Ok(report)
    }

    /// Copy or move records between two scopes, keeping their triples.
    /// Destination records with the same triple are overwritten.
    pub fn copy_scope_to_scope(
        &mut self,
        source: Option<ObjectId>,
        dest: Option<ObjectId>,
        filter: &PatternFilter,
        transfer: Transfer,
    ) -> Result<MigrationReport> {
        let from = ScopeResolver::classify(&self.world, source);
        let to = ScopeResolver::classify(&self.world, dest);
        let (Some(from), Some(to)) = (from, to) else {
            tracing::debug!("Migration between {:?} and {:?} has an unrecognized end", source, dest);
            return Ok(MigrationReport::default());
        };
        if from == to {
            tracing::debug!("Migration of {} onto itself skipped", from);
            return Ok(MigrationReport::default());
        }

        let mut report = MigrationReport::default();
        let now = self.clock.now();

        let Some(table) = self.registry.table(from, &self.world)? else {
            return Ok(report);
        };
        warn_on_hazard("Migration", table.table(), filter, transfer == Transfer::Move);
        let exported = table.select_pattern(filter)?;
        report.exported = exported.len();

        let batch: Vec<RawRecord> = exported
            .iter()
            .map(|r| RawRecord {
                timestamp: now,
                ..r.clone()
            })
            .collect();

        let Some(table) = self.registry.table(to, &self.world)? else {
            report.skipped = report.exported;
            return Ok(report);
        };
        report.written = table.upsert_batch(&batch)?;

        if transfer == Transfer::Move {
            if let Some(table) = self.registry.table(from, &self.world)? {
                report.removed = table.delete_batch(&exported)?;
            }
        }

        tracing::info!("Migrated {} into {}: {}", from, to, report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeKind, MemoryAttributes};
    use crate::clock::ManualClock;
    use crate::value::{Location, Vector3};
    use crate::world::MemoryWorld;

    const GLOBAL: Option<ObjectId> = Some(ObjectId::GLOBAL);

    fn store() -> VarStore<MemoryWorld> {
        VarStore::in_memory(MemoryWorld::new()).with_clock(ManualClock::new(500))
    }

    #[test]
    fn test_attributes_to_scope_move() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let pc = store.world_mut().connect_principal("hal");

        attrs.set(pc, "quest_a", Attribute::Int(1));
        attrs.set(pc, "quest_b", Attribute::String("done".into()));
        attrs.set(pc, "other", Attribute::Int(9));
        attrs.set(
            pc,
            "blob",
            Attribute::Opaque {
                kind: 7,
                raw: "??".into(),
            },
        );

        let filter = PatternFilter::new().name("quest_*");
        let report = store
            .copy_attributes_to_scope(&mut attrs, pc, Some(pc), &filter, "import", Transfer::Move)
            .unwrap();

        assert_eq!(report.exported, 2);
        assert_eq!(report.written, 2);
        assert_eq!(report.removed, 2);
        assert_eq!(store.get_int(Some(pc), "quest_a", "import").unwrap(), 1);
        assert_eq!(store.get_string(Some(pc), "quest_b", "import").unwrap(), "done");
        assert!(attrs.get(pc, AttributeKind::Int, "quest_a").is_none());
        assert!(attrs.get(pc, AttributeKind::Int, "other").is_some());
    }

    #[test]
    fn test_attributes_to_scope_type_mask() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let chest = store.world_mut().spawn(serde_json::json!({"resref": "chest"}), None);

        attrs.set(chest, "n", Attribute::Int(3));
        attrs.set(chest, "f", Attribute::Float(0.5));

        let filter = PatternFilter::new().types(VarType::Float);
        let report = store
            .copy_attributes_to_scope(&mut attrs, chest, GLOBAL, &filter, "", Transfer::Copy)
            .unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(store.get_float(GLOBAL, "f", "").unwrap(), 0.5);
        assert_eq!(store.get_int(GLOBAL, "n", "").unwrap(), 0);
        assert_eq!(attrs.count(chest), 2);
    }

    #[test]
    fn test_scope_to_attributes_disambiguates_tags() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let target = store.world_mut().spawn(serde_json::json!({}), None);

        store.set_int(None, "hp", 10, "").unwrap();
        store.set_int(None, "hp", 20, "boss").unwrap();
        store.set_int(None, "mp", 5, "boss").unwrap();
        store.set_vector(None, "dir", Vector3::new(0.0, 1.0, 0.0), "").unwrap();

        let report = store
            .copy_scope_to_attributes(&mut attrs, None, target, &PatternFilter::new(), Transfer::Move)
            .unwrap();

        assert_eq!(report.exported, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 3);
        assert_eq!(report.removed, 3);
        assert_eq!(attrs.get(target, AttributeKind::Int, "hp"), Some(Attribute::Int(10)));
        assert_eq!(attrs.get(target, AttributeKind::Int, "hp@boss"), Some(Attribute::Int(20)));
        assert_eq!(attrs.get(target, AttributeKind::Int, "mp"), Some(Attribute::Int(5)));

        let left = store.get_by_pattern(None, &PatternFilter::new()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].var_type, VarType::Vector);
    }

    #[test]
    fn test_scope_to_attributes_location() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let area = store.world_mut().add_area("inn");
        let target = store.world_mut().spawn(serde_json::json!({}), None);
        let spot = Location::new(area, Vector3::new(1.0, 2.0, 0.0), 90.0);

        store.set_location(GLOBAL, "bed", spot, "").unwrap();
        store
            .copy_scope_to_attributes(&mut attrs, GLOBAL, target, &PatternFilter::new(), Transfer::Copy)
            .unwrap();

        assert_eq!(attrs.get(target, AttributeKind::Location, "bed"), Some(Attribute::Location(spot)));
        assert_eq!(store.get_location(GLOBAL, "bed", "").unwrap(), spot);
    }

    #[test]
    fn test_scope_to_scope_move() {
        let mut store = store();
        let pc = store.world_mut().connect_principal("ivy");

        store.set_int(None, "score", 7, "round1").unwrap();
        store.set_string(None, "name", "ivy", "").unwrap();
        store.set_int(GLOBAL, "score", 1, "round1").unwrap();

        let filter = PatternFilter::new().types(VarType::Int);
        let report = store
            .copy_scope_to_scope(None, Some(pc), &filter, Transfer::Move)
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(store.get_int(Some(pc), "score", "round1").unwrap(), 7);
        assert_eq!(store.get_int(None, "score", "round1").unwrap(), 0);
        assert_eq!(store.get_string(None, "name", "").unwrap(), "ivy");

        store
            .copy_scope_to_scope(Some(pc), GLOBAL, &PatternFilter::new(), Transfer::Copy)
            .unwrap();
        assert_eq!(store.get_int(GLOBAL, "score", "round1").unwrap(), 7);
        assert_eq!(store.get_int(Some(pc), "score", "round1").unwrap(), 7);
    }

    #[test]
    fn test_scope_onto_itself_is_noop() {
        let mut store = store();
        store.set_int(GLOBAL, "x", 1, "").unwrap();
        let report = store
            .copy_scope_to_scope(GLOBAL, GLOBAL, &PatternFilter::new(), Transfer::Move)
            .unwrap();
        assert_eq!(report, MigrationReport::default());
        assert_eq!(store.get_int(GLOBAL, "x", "").unwrap(), 1);
    }

    #[test]
    fn test_unrecognized_destination_keeps_source() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let area = store.world_mut().add_area("void");
        attrs.set(area, "k", Attribute::Int(1));

        let report = store
            .copy_attributes_to_scope(&mut attrs, area, Some(area), &PatternFilter::new(), "", Transfer::Move)
            .unwrap();
        assert_eq!(report, MigrationReport::default());
        assert_eq!(attrs.count(area), 1);
    }

    /// Breaks the destination table after its schema is ensured, so the
    /// next batch write fails
    fn break_table(store: &mut VarStore<MemoryWorld>, handle: Option<ObjectId>) {
        let table = VarStore::table_for(&mut store.registry, &store.world, handle)
            .unwrap()
            .unwrap();
        let sql = format!("DROP TABLE {}", table.table());
        table.connection().execute(&sql, []).unwrap();
    }

    #[test]
    fn test_failed_destination_keeps_scope_source() {
        let mut store = store();
        store.set_int(None, "a", 1, "").unwrap();
        store.set_string(None, "b", "x", "t").unwrap();
        break_table(&mut store, GLOBAL);

        let result = store.copy_scope_to_scope(None, GLOBAL, &PatternFilter::new(), Transfer::Move);
        assert!(matches!(result, Err(crate::Error::Storage(_))), "{:?}", result);
        assert_eq!(store.get_int(None, "a", "").unwrap(), 1);
        assert_eq!(store.get_string(None, "b", "t").unwrap(), "x");
        assert_eq!(store.count_by_pattern(None, &PatternFilter::new()).unwrap(), 2);
    }

    #[test]
    fn test_failed_destination_keeps_attribute_source() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let chest = store.world_mut().spawn(serde_json::json!({}), None);
        attrs.set(chest, "a", Attribute::Int(1));
        attrs.set(chest, "b", Attribute::Float(2.0));
        break_table(&mut store, GLOBAL);

        let result =
            store.copy_attributes_to_scope(&mut attrs, chest, GLOBAL, &PatternFilter::new(), "", Transfer::Move);
        assert!(result.is_err());
        assert_eq!(attrs.count(chest), 2);
        assert_eq!(attrs.get(chest, AttributeKind::Int, "a"), Some(Attribute::Int(1)));
    }

    #[test]
    fn test_attribute_names_use_sql_glob() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let chest = store.world_mut().spawn(serde_json::json!({}), None);
        for name in ["^x", "bx", "ax", "Bx"] {
            attrs.set(chest, name, Attribute::Int(1));
        }

        let filter = PatternFilter::new().name("[^a]x");
        let report = store
            .copy_attributes_to_scope(&mut attrs, chest, GLOBAL, &filter, "", Transfer::Copy)
            .unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(store.get_int(GLOBAL, "^x", "").unwrap(), 1);
        assert_eq!(store.get_int(GLOBAL, "bx", "").unwrap(), 1);
        assert_eq!(store.get_int(GLOBAL, "Bx", "").unwrap(), 1);
        assert_eq!(store.get_int(GLOBAL, "ax", "").unwrap(), 0);

        // the same pattern selects the same names back out of the scope
        let copied = store.count_by_pattern(GLOBAL, &filter).unwrap();
        assert_eq!(copied, report.written);

        let filter = PatternFilter::new().name("b*");
        let report = store
            .copy_attributes_to_scope(&mut attrs, chest, None, &filter, "", Transfer::Copy)
            .unwrap();
        assert_eq!(report.written, 1);
    }

    #[test]
    fn test_unfiltered_move_warns() {
        let mut store = store();
        let mut attrs = MemoryAttributes::new();
        let chest = store.world_mut().spawn(serde_json::json!({}), None);
        attrs.set(chest, "a", Attribute::Int(1));
        store.set_int(None, "b", 2, "").unwrap();

        let (_, logs) = crate::testing::capture_logs(|| {
            store
                .copy_attributes_to_scope(&mut attrs, chest, GLOBAL, &PatternFilter::new(), "", Transfer::Move)
                .unwrap()
        });
        assert!(logs.contains("has no predicates"), "{}", logs);

        let (_, logs) = crate::testing::capture_logs(|| {
            store
                .copy_scope_to_scope(None, GLOBAL, &PatternFilter::new(), Transfer::Move)
                .unwrap()
        });
        assert!(logs.contains("Migration on module_variables has no predicates"), "{}", logs);

        let (_, logs) = crate::testing::capture_logs(|| {
            store
                .copy_scope_to_attributes(&mut attrs, GLOBAL, chest, &PatternFilter::new(), Transfer::Move)
                .unwrap()
        });
        assert!(logs.contains("Migration on persistent_variables has no predicates"), "{}", logs);

        let (_, logs) = crate::testing::capture_logs(|| {
            store
                .copy_scope_to_scope(GLOBAL, None, &PatternFilter::new(), Transfer::Copy)
                .unwrap()
        });
        assert!(!logs.contains("has no predicates"), "{}", logs);
    }
}
