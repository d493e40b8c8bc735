//! # EntiMap Core
//!
//! Entity metadata, key mapping and value conversion for EntiMap.
//!
//! This crate provides:
//! - Entity metadata (`Schema`, attribute and relationship descriptors)
//! - Acronym-aware snake_case / camelCase inflection
//! - Key mapping between external record keys and local attribute names
//! - Value coercion between external values and typed attribute values
//! - Date parsing and formatting
//! - The `Store` persistence surface and an in-memory implementation
//! - Export of persisted objects back into records
//!
//! ## Example
//!
//! ```rust
//! use entimap_codec::Value;
//! use entimap_core::coerce::ValueCoercer;
//! use entimap_core::inflection::Inflection;
//! use entimap_core::keys::KeyMapper;
//! use entimap_core::Schema;
//!
//! let schema = Schema::from_json(r#"{"entities": [{
//!     "name": "User",
//!     "attributes": [
//!         {"name": "remoteID", "type": "integer"},
//!         {"name": "birthDate", "type": "date"}
//!     ]
//! }]}"#).unwrap();
//! let user = schema.entity("User").unwrap();
//!
//! let mapper = KeyMapper::new(user, Inflection::SnakeCase);
//! let attribute = mapper.attribute_for_remote_key("birth_date").unwrap();
//! let value = ValueCoercer::plain()
//!     .to_native(&Value::from("1989-02-14"), attribute)
//!     .unwrap();
//! assert!(value.is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod coerce;
mod config;
pub mod date;
mod error;
pub mod export;
pub mod inflection;
pub mod keys;
mod object;
pub mod predicate;
pub mod schema;
pub mod store;

pub use coerce::{CoercionError, KeyValue, NativeValue, TransformerRegistry, ValueCoercer};
pub use config::{BinaryExport, ExportOptions, RelationshipExport};
pub use date::{DateFormatter, Timestamp};
pub use error::{CoreError, CoreResult};
pub use export::Exporter;
pub use inflection::{Inflection, InflectionCache};
pub use keys::KeyMapper;
pub use object::ObjectId;
pub use predicate::Predicate;
pub use schema::{
    AttributeDescriptor, AttributeType, Cardinality, EntityMetadata, RelationshipDescriptor,
    Schema,
};
pub use store::{with_unit_of_work, MemoryStore, Store};
