//! Classification of relationship payloads found in a record.

use entimap_codec::{Record, Value};
use entimap_core::{KeyMapper, RelationshipExport, RelationshipDescriptor};
use tracing::warn;

/// One member of a to-many payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    /// A full nested record.
    Record(Record),
    /// A bare primary-key value.
    Reference(Value),
}

/// What a record says about one relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipPayload {
    /// The record does not mention the relationship.
    Absent,
    /// Explicit null on a to-one relationship.
    Null,
    /// A bare primary-key value for a to-one relationship.
    ScalarRef(Value),
    /// A nested record for a to-one relationship.
    NestedRecord(Record),
    /// The complete member list of a to-many relationship. Null arrives
    /// here as an empty list.
    RecordList {
        /// Members in payload order.
        items: Vec<ListItem>,
        /// True when the payload came in the `_ids` form.
        references_only: bool,
    },
}

impl RelationshipPayload {
    /// Reads `relationship` out of `record`.
    ///
    /// Looks at the plain key, then the nested-export key
    /// (`<key>_attributes`), then the reference key (`<key>_id` /
    /// `<key>_ids`).
    pub fn classify(
        record: &Record,
        mapper: &KeyMapper<'_>,
        relationship: &RelationshipDescriptor,
    ) -> Self {
        let nested_keys = [
            mapper.remote_key_for_relationship(relationship),
            mapper.relationship_export_key(relationship, RelationshipExport::Nested),
        ];
        if let Some(value) = nested_keys.iter().find_map(|key| record.get(key)) {
            return Self::from_nested(value, relationship);
        }

        let reference_key = mapper.reference_key_for_relationship(relationship);
        match record.get(&reference_key) {
            Some(value) => Self::from_references(value, relationship),
            None => Self::Absent,
        }
    }

    fn from_nested(value: &Value, relationship: &RelationshipDescriptor) -> Self {
        if relationship.is_to_many() {
            let items = match value {
                Value::Null => Vec::new(),
                Value::Array(items) => items.iter().filter_map(list_item).collect(),
                // Nested-attributes form: {"0": {...}, "1": {...}}
                Value::Map(members) => members.iter().filter_map(|(_, v)| list_item(v)).collect(),
                scalar => vec![ListItem::Reference(scalar.clone())],
            };
            let references_only =
                !items.is_empty() && items.iter().all(|i| matches!(i, ListItem::Reference(_)));
            return Self::RecordList {
                items,
                references_only,
            };
        }

        match value {
            Value::Null => Self::Null,
            Value::Map(record) => Self::NestedRecord(record.clone()),
            Value::Array(_) => {
                warn!(
                    relationship = %relationship.name,
                    "list given for to-one relationship, ignoring"
                );
                Self::Absent
            }
            scalar => Self::ScalarRef(scalar.clone()),
        }
    }

    fn from_references(value: &Value, relationship: &RelationshipDescriptor) -> Self {
        if !relationship.is_to_many() {
            return match value {
                Value::Null => Self::Null,
                v if v.is_scalar() => Self::ScalarRef(v.clone()),
                _ => Self::Absent,
            };
        }
        let items = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .filter(|v| v.is_scalar())
                .cloned()
                .map(ListItem::Reference)
                .collect(),
            v if v.is_scalar() => vec![ListItem::Reference(v.clone())],
            _ => return Self::Absent,
        };
        Self::RecordList {
            items,
            references_only: true,
        }
    }
}

fn list_item(value: &Value) -> Option<ListItem> {
    match value {
        Value::Null => None,
        Value::Map(record) => Some(ListItem::Record(record.clone())),
        Value::Array(_) => None,
        scalar => Some(ListItem::Reference(scalar.clone())),
    }
}
