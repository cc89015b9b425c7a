//! Restoration of packed master data into record form
//!
//! Token-region master data arrives in two space-saving layouts:
//!
//! - **Positional**: each record is an array whose slots follow the table's
//!   [`SchemaNode`] layout.
//! - **Compact**: tables whose name starts with `compact` are stored column by
//!   column, with optional per-column enum dictionaries under `__ENUM__`.
//!
//! Both are turned back into arrays of JSON objects. A table that fails to
//! restore aborts the whole dataset.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use sekai_protocol::MasterPayload;

use crate::error::{DecodeError, MasterError, Result};
use crate::schema::{SchemaNode, SchemaRegistry};

pub const COMPACT_PREFIX: &str = "compact";
pub const ENUM_KEY: &str = "__ENUM__";

/// Tables that are appended to over time, with their identity field
pub const IDENTITY_TABLES: &[(&str, &str)] = &[("eventCards", "cardId")];

/// Turn one positional record into an object
pub fn restore_record(record: &Value, layout: &[SchemaNode]) -> std::result::Result<Map<String, Value>, DecodeError> {
    let slots = record
        .as_array()
        .ok_or_else(|| DecodeError::NotAnArray("record".to_string()))?;
    let mut restored = Map::new();

    for (index, node) in layout.iter().enumerate() {
        let slot = match slots.get(index) {
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };

        match node {
            SchemaNode::Field(name) => {
                restored.insert(name.clone(), slot.clone());
            }
            SchemaNode::NestedList(name, nested) => {
                let items = slot
                    .as_array()
                    .ok_or_else(|| DecodeError::NotAnArray(name.clone()))?;
                let children = items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| restore_record(item, nested).map(Value::Object))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                restored.insert(name.clone(), Value::Array(children));
            }
            SchemaNode::NestedTuple(name, fields) => {
                let values = slot
                    .as_array()
                    .ok_or_else(|| DecodeError::NotAnArray(name.clone()))?;
                let tuple: Map<String, Value> = fields
                    .iter()
                    .zip(values)
                    .filter(|(_, value)| !value.is_null())
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect();
                restored.insert(name.clone(), Value::Object(tuple));
            }
        }
    }

    Ok(restored)
}

/// Rebuild row-major records from a column-major table.
///
/// Rows are cut at the shortest column. A null dictionary index stays null.
pub fn restore_compact_table(table: &Map<String, Value>) -> std::result::Result<Vec<Value>, DecodeError> {
    let enums = match table.get(ENUM_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::Object(enums)) => Some(enums),
        Some(_) => return Err(DecodeError::NotAnObject(ENUM_KEY.to_string())),
    };

    let mut columns: Vec<(&String, Vec<Value>)> = Vec::with_capacity(table.len());
    for (label, raw) in table {
        if label == ENUM_KEY {
            continue;
        }
        let values = raw
            .as_array()
            .ok_or_else(|| DecodeError::NotAnArray(label.clone()))?;

        let column = match enums.and_then(|e| e.get(label)) {
            Some(dictionary) => {
                let dictionary = dictionary
                    .as_array()
                    .ok_or_else(|| DecodeError::NotAnArray(format!("{ENUM_KEY}.{label}")))?;
                values
                    .iter()
                    .map(|index| resolve_enum(label, dictionary, index))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => values.clone(),
        };
        columns.push((label, column));
    }

    let rows = columns.iter().map(|(_, c)| c.len()).min().unwrap_or(0);
    Ok((0..rows)
        .map(|row| {
            Value::Object(
                columns
                    .iter()
                    .map(|(label, column)| ((*label).clone(), column[row].clone()))
                    .collect(),
            )
        })
        .collect())
}

fn resolve_enum(column: &str, dictionary: &[Value], index: &Value) -> std::result::Result<Value, DecodeError> {
    if index.is_null() {
        return Ok(Value::Null);
    }
    index
        .as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .and_then(|i| dictionary.get(i))
        .cloned()
        .ok_or_else(|| DecodeError::EnumIndex {
            column: column.to_string(),
            index: index.to_string(),
        })
}

/// Union of `existing` and `new` keyed by `field`, sorted ascending.
///
/// Existing records whose identity also appears in `new` are dropped, so the
/// new record wins.
pub fn merge_by_identity(
    existing: Vec<Value>,
    new: Vec<Value>,
    field: &str,
) -> std::result::Result<Vec<Value>, DecodeError> {
    let identity = |record: &Value| -> std::result::Result<Value, DecodeError> {
        record
            .get(field)
            .cloned()
            .ok_or_else(|| DecodeError::MissingIdentity(field.to_string()))
    };

    let new_ids = new
        .iter()
        .map(|record| identity(record).map(|id| id.to_string()))
        .collect::<std::result::Result<HashSet<_>, _>>()?;

    let mut merged = Vec::with_capacity(existing.len() + new.len());
    for record in existing {
        if !new_ids.contains(&identity(&record)?.to_string()) {
            merged.push(record);
        }
    }
    merged.extend(new);

    merged.sort_by(|a, b| compare_identity(a.get(field), b.get(field)));
    Ok(merged)
}

/// Numbers sort before strings; anything else sorts last
fn compare_identity(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(_)), _) => Ordering::Less,
        (_, Some(Value::Number(_))) => Ordering::Greater,
        (Some(Value::String(_)), _) => Ordering::Less,
        (_, Some(Value::String(_))) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// `compactEventCards` becomes `eventCards`
pub fn compact_table_name(key: &str) -> Option<String> {
    let rest = key.strip_prefix(COMPACT_PREFIX)?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}

fn into_rows(table: &str, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(rows) => Ok(rows),
        _ => Err(MasterError::decode(table, DecodeError::NotAnArray(table.to_string()))),
    }
}

/// Restores a downloaded dataset with a fixed schema registry
#[derive(Debug, Clone)]
pub struct MasterDataDecoder {
    schema: Arc<SchemaRegistry>,
}

impl MasterDataDecoder {
    pub const fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Restore whatever shape the payload arrived in.
    ///
    /// Shard downloads are already in record form and pass through.
    pub fn decode(&self, payload: MasterPayload) -> Result<Map<String, Value>> {
        match payload {
            MasterPayload::Packed(tables) => self.restore_dataset(tables),
            MasterPayload::Split(tables) => Ok(tables),
        }
    }

    /// Restore compact and positional tables, then merge identity tables.
    ///
    /// Raw `compact*` tables are kept next to their restored counterparts.
    /// When a plain table and a restored compact table share a name, the
    /// plain one is kept, except for identity tables which are merged.
    pub fn restore_dataset(&self, raw: Map<String, Value>) -> Result<Map<String, Value>> {
        let mut restored_compact = Map::new();
        let mut tables = Map::new();

        for (key, value) in raw {
            if let Some(name) = compact_table_name(&key) {
                let Value::Object(columns) = &value else {
                    return Err(MasterError::decode(&key, DecodeError::NotAnObject(key.clone())));
                };
                let rows = restore_compact_table(columns).map_err(|e| MasterError::decode(&key, e))?;
                debug!("Restored compact table {} ({} rows)", name, rows.len());
                restored_compact.insert(name, Value::Array(rows));
                tables.insert(key, value);
            } else if let Some(layout) = self.schema.get(&key) {
                let rows = into_rows(&key, value)?
                    .iter()
                    .map(|record| restore_record(record, layout).map(Value::Object))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| MasterError::decode(&key, e))?;
                tables.insert(key, Value::Array(rows));
            } else {
                tables.insert(key, value);
            }
        }

        for &(table, field) in IDENTITY_TABLES {
            if !(restored_compact.contains_key(table) && tables.contains_key(table)) {
                continue;
            }
            if let (Some(existing), Some(new)) = (restored_compact.remove(table), tables.remove(table)) {
                let merged = merge_by_identity(into_rows(table, existing)?, into_rows(table, new)?, field)
                    .map_err(|e| MasterError::decode(table, e))?;
                tables.insert(table.to_string(), Value::Array(merged));
            }
        }

        for (name, rows) in restored_compact {
            if !tables.contains_key(&name) {
                tables.insert(name, rows);
            }
        }
        Ok(tables)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(name: &str) -> SchemaNode {
        SchemaNode::Field(name.to_string())
    }

    fn layout() -> Vec<SchemaNode> {
        vec![
            field("id"),
            field("seq"),
            SchemaNode::NestedList("children".to_string(), vec![field("a"), field("b")]),
        ]
    }

    #[test]
    fn test_restore_nested_record() {
        let restored = restore_record(&json!([1, 2, [[3, 4]]]), &layout()).unwrap();
        assert_eq!(
            Value::Object(restored),
            json!({"id": 1, "seq": 2, "children": [{"a": 3, "b": 4}]})
        );
    }

    #[test]
    fn test_null_slot_omitted() {
        let restored = restore_record(&json!([1, null, [[3, null], null]]), &layout()).unwrap();
        assert_eq!(
            Value::Object(restored),
            json!({"id": 1, "children": [{"a": 3}]})
        );
    }

    #[test]
    fn test_short_record_omits_missing_slots() {
        let restored = restore_record(&json!([5]), &layout()).unwrap();
        assert_eq!(Value::Object(restored), json!({"id": 5}));
    }

    #[test]
    fn test_nested_tuple() {
        let layout = vec![
            field("id"),
            SchemaNode::NestedTuple(
                "info".to_string(),
                vec!["gachaId".to_string(), "summary".to_string(), "description".to_string()],
            ),
        ];
        let restored = restore_record(&json!([7, [7, "sum", null]]), &layout).unwrap();
        assert_eq!(
            Value::Object(restored),
            json!({"id": 7, "info": {"gachaId": 7, "summary": "sum"}})
        );
    }

    #[test]
    fn test_record_type_mismatch() {
        assert_eq!(
            restore_record(&json!({"id": 1}), &layout()),
            Err(DecodeError::NotAnArray("record".to_string()))
        );
        assert_eq!(
            restore_record(&json!([1, 2, 3]), &layout()),
            Err(DecodeError::NotAnArray("children".to_string()))
        );
    }

    #[test]
    fn test_compact_restore() {
        let table = json!({
            "__ENUM__": {"c1": ["x", "y"]},
            "c1": [0, 1, 0],
            "c2": [10, 20, 30]
        });
        let rows = restore_compact_table(table.as_object().unwrap()).unwrap();
        assert_eq!(
            rows,
            vec![
                json!({"c1": "x", "c2": 10}),
                json!({"c1": "y", "c2": 20}),
                json!({"c1": "x", "c2": 30}),
            ]
        );
    }

    #[test]
    fn test_compact_shortest_column_and_null_index() {
        let table = json!({
            "__ENUM__": {"kind": ["a"]},
            "kind": [null, 0, 0],
            "id": [1, 2]
        });
        let rows = restore_compact_table(table.as_object().unwrap()).unwrap();
        assert_eq!(
            rows,
            vec![json!({"kind": null, "id": 1}), json!({"kind": "a", "id": 2})]
        );
    }

    #[test]
    fn test_compact_bad_enum_index() {
        let table = json!({"__ENUM__": {"kind": ["a"]}, "kind": [3]});
        assert_eq!(
            restore_compact_table(table.as_object().unwrap()),
            Err(DecodeError::EnumIndex {
                column: "kind".to_string(),
                index: "3".to_string()
            })
        );
    }

    #[test]
    fn test_merge_by_identity() {
        let merged = merge_by_identity(
            vec![json!({"id": 1}), json!({"id": 3, "old": true})],
            vec![json!({"id": 2}), json!({"id": 3})],
            "id",
        )
        .unwrap();
        assert_eq!(merged, vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
    }

    #[test]
    fn test_merge_requires_identity() {
        assert_eq!(
            merge_by_identity(vec![json!({"x": 1})], vec![], "id"),
            Err(DecodeError::MissingIdentity("id".to_string()))
        );
    }

    #[test]
    fn test_compact_table_name() {
        assert_eq!(compact_table_name("compactEventCards").as_deref(), Some("eventCards"));
        assert_eq!(compact_table_name("compact"), None);
        assert_eq!(compact_table_name("cards"), None);
    }

    #[test]
    fn test_restore_dataset() {
        let mut registry = SchemaRegistry::default();
        registry.insert("cards", vec![field("id"), field("name")]);
        let decoder = MasterDataDecoder::new(Arc::new(registry));

        let raw = json!({
            "cards": [[1, "miku"], [2, null]],
            "compactEventCards": {"cardId": [1, 3], "eventId": [10, 10]},
            "eventCards": [{"cardId": 3, "eventId": 11}, {"cardId": 2, "eventId": 11}],
            "compactGameCharacters": {"id": [1]},
            "untouched": {"k": "v"}
        });
        let Value::Object(raw) = raw else { unreachable!() };
        let restored = decoder.restore_dataset(raw).unwrap();

        assert_eq!(restored["cards"], json!([{"id": 1, "name": "miku"}, {"id": 2}]));
        assert_eq!(
            restored["eventCards"],
            json!([
                {"cardId": 1, "eventId": 10},
                {"cardId": 2, "eventId": 11},
                {"cardId": 3, "eventId": 11}
            ])
        );
        assert_eq!(restored["gameCharacters"], json!([{"id": 1}]));
        assert_eq!(restored["untouched"], json!({"k": "v"}));
        assert_eq!(
            restored["compactEventCards"],
            json!({"cardId": [1, 3], "eventId": [10, 10]})
        );
    }

    fn identity_decoder() -> MasterDataDecoder {
        MasterDataDecoder::new(Arc::new(SchemaRegistry::default()))
    }

    #[test]
    fn test_identity_table_only_compact() {
        let Value::Object(raw) = json!({"compactEventCards": {"cardId": [2, 1], "eventId": [9, 9]}})
        else {
            unreachable!()
        };
        let restored = identity_decoder().restore_dataset(raw).unwrap();
        assert_eq!(
            restored["eventCards"],
            json!([{"cardId": 2, "eventId": 9}, {"cardId": 1, "eventId": 9}])
        );
        assert!(restored.contains_key("compactEventCards"));
    }

    #[test]
    fn test_identity_table_only_plain() {
        let Value::Object(raw) = json!({"eventCards": [{"cardId": 5, "eventId": 9}]}) else {
            unreachable!()
        };
        let restored = identity_decoder().restore_dataset(raw).unwrap();
        assert_eq!(restored["eventCards"], json!([{"cardId": 5, "eventId": 9}]));
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_restored_fields_follow_schema_order() {
        let mut registry = SchemaRegistry::default();
        registry.insert("cards", vec![field("id"), field("assetbundleName")]);
        let decoder = MasterDataDecoder::new(Arc::new(registry));

        let Value::Object(raw) = json!({"cards": [[1, "res001"]]}) else { unreachable!() };
        let restored = decoder.restore_dataset(raw).unwrap();
        assert_eq!(
            serde_json::to_string(&restored["cards"]).unwrap(),
            r#"[{"id":1,"assetbundleName":"res001"}]"#
        );
    }

    #[test]
    fn test_restore_dataset_reports_table() {
        let mut registry = SchemaRegistry::default();
        registry.insert("cards", vec![field("id")]);
        let decoder = MasterDataDecoder::new(Arc::new(registry));

        let Value::Object(raw) = json!({"cards": [{"id": 1}]}) else { unreachable!() };
        match decoder.restore_dataset(raw) {
            Err(MasterError::Decode { table, .. }) => assert_eq!(table, "cards"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_split_payload_passes_through() {
        let decoder = MasterDataDecoder::new(Arc::new(SchemaRegistry::default()));
        let mut tables = Map::new();
        tables.insert("cards".to_string(), json!([[1, 2]]));
        let decoded = decoder.decode(MasterPayload::Split(tables.clone())).unwrap();
        assert_eq!(decoded, tables);
    }
}
