//! Canonical records: collections, cards, sold items and the profile.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CollectionId, Error, new_record_id};

/// Opaque domain fields of a card or sold item, in document order.
pub type Fields = serde_json::Map<String, Value>;

/// Extracts a usable record id from a field map.
///
/// Accepts a non-empty string or a number (rendered in decimal). Anything
/// else means the record has no id of its own.
#[must_use]
pub fn record_id_of(fields: &Fields) -> Option<String> {
    match fields.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A named grouping of cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    /// Derived value, recomputed from the stored cards after every import.
    #[serde(default)]
    pub card_count: u64,
}

impl Collection {
    /// Creates an empty collection with a freshly minted id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CollectionId::new(),
            name: name.into(),
            card_count: 0,
        }
    }
}

/// A card owned by exactly one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub collection_id: CollectionId,
    /// Source fields, kept verbatim.
    pub fields: Fields,
}

impl Card {
    /// Builds a card from its source fields, keeping the source id when it
    /// has one.
    #[must_use]
    pub fn from_fields(fields: Fields, collection_id: CollectionId) -> Self {
        let id = record_id_of(&fields).unwrap_or_else(new_record_id);
        Self {
            id,
            collection_id,
            fields,
        }
    }

    /// Renders the card as a flat document: the source fields with `id` and
    /// `collectionId` set to the stored values.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut doc = self.fields.clone();
        doc.insert("id".into(), Value::String(self.id.clone()));
        doc.insert(
            "collectionId".into(),
            Value::String(self.collection_id.as_str().to_string()),
        );
        Value::Object(doc)
    }
}

/// A card that has been sold. Lives in its own bucket, outside collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldItem {
    pub id: String,
    pub fields: Fields,
}

impl SoldItem {
    #[must_use]
    pub fn from_fields(fields: Fields) -> Self {
        let id = record_id_of(&fields).unwrap_or_else(new_record_id);
        Self { id, fields }
    }

    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut doc = self.fields.clone();
        doc.insert("id".into(), Value::String(self.id.clone()));
        Value::Object(doc)
    }
}

/// The account profile. A singleton that is always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(pub Fields);

impl Profile {
    /// Builds a profile from a decoded document, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(Error::NotAnObject("profile")),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.0
    }
}
