//! Document identifiers assigned before the first attempt.
//!
//! Inserts are only safe to retry when every attempt resends the same
//! identifier: a duplicate key on the identifier index then proves that an
//! earlier attempt landed. Documents without an identifier get an
//! [`ObjectId`] once, before the first attempt.

use bson::{Bson, Document};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use bson::oid::ObjectId;

/// Field holding a document's primary identifier.
pub const ID_FIELD: &str = "_id";

/// Name of the unique index over [`ID_FIELD`].
pub const ID_INDEX: &str = "_id_";

const OID_KEY: &str = "$oid";

/// Renders `id` as extended JSON, `{"$oid": "<hex>"}`.
pub fn object_id_value(id: ObjectId) -> Value {
    let mut map = Map::new();
    map.insert(OID_KEY.to_string(), Value::String(id.to_hex()));
    Value::Object(map)
}

/// Reads an identifier stored as `{"$oid": "<hex>"}` or as a bare hex
/// string.
pub fn object_id_from_value(value: &Value) -> Option<ObjectId> {
    let hex = match value {
        Value::String(hex) => hex.as_str(),
        Value::Object(map) => map.get(OID_KEY)?.as_str()?,
        _ => return None,
    };
    ObjectId::parse_str(hex).ok()
}

/// Something that can carry a document identifier.
///
/// Implemented for the JSON and BSON container shapes transports hand
/// over; typed documents implement it for their own identifier field.
pub trait DocumentIdentity {
    /// Returns true when an identifier is present. A `null` value counts as
    /// absent.
    fn has_identifier(&self) -> bool;

    /// Stores `id` as the identifier.
    fn set_identifier(&mut self, id: ObjectId);
}

impl DocumentIdentity for Map<String, Value> {
    fn has_identifier(&self) -> bool {
        self.get(ID_FIELD).is_some_and(|id| !id.is_null())
    }

    fn set_identifier(&mut self, id: ObjectId) {
        self.insert(ID_FIELD.to_string(), object_id_value(id));
    }
}

impl DocumentIdentity for BTreeMap<String, Value> {
    fn has_identifier(&self) -> bool {
        self.get(ID_FIELD).is_some_and(|id| !id.is_null())
    }

    fn set_identifier(&mut self, id: ObjectId) {
        self.insert(ID_FIELD.to_string(), object_id_value(id));
    }
}

/// Native BSON documents store the identifier as a BSON object id.
impl DocumentIdentity for Document {
    fn has_identifier(&self) -> bool {
        self.get(ID_FIELD).is_some_and(|id| *id != Bson::Null)
    }

    fn set_identifier(&mut self, id: ObjectId) {
        self.insert(ID_FIELD, id);
    }
}

/// Only JSON objects hold identifiers; other values are left untouched.
impl DocumentIdentity for Value {
    fn has_identifier(&self) -> bool {
        self.as_object().is_some_and(DocumentIdentity::has_identifier)
    }

    fn set_identifier(&mut self, id: ObjectId) {
        if let Value::Object(map) = self {
            map.set_identifier(id);
        }
    }
}

impl<T: DocumentIdentity + ?Sized> DocumentIdentity for &mut T {
    fn has_identifier(&self) -> bool {
        (**self).has_identifier()
    }

    fn set_identifier(&mut self, id: ObjectId) {
        (**self).set_identifier(id)
    }
}

impl<T: DocumentIdentity + ?Sized> DocumentIdentity for Box<T> {
    fn has_identifier(&self) -> bool {
        (**self).has_identifier()
    }

    fn set_identifier(&mut self, id: ObjectId) {
        (**self).set_identifier(id)
    }
}

/// Gives `document` a fresh identifier if it has none.
///
/// Returns the generated identifier, or `None` when the document already had
/// one or cannot hold one.
pub fn assign_identifier<D>(document: &mut D) -> Option<ObjectId>
where
    D: DocumentIdentity + ?Sized,
{
    if document.has_identifier() {
        return None;
    }

    let id = ObjectId::new();
    document.set_identifier(id);
    document.has_identifier().then_some(id)
}
