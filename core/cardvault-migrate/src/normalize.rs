//! Schema normalization for imported documents.
//!
//! Card data has been exported in several shapes over time:
//!
//! | Shape              | Example                                         |
//! |--------------------|-------------------------------------------------|
//! | `ArrayOfCards`     | `[ {card}, ... ]`                               |
//! | `CollectionsArray` | `{ "collections": [ {id, name, cards}, ... ] }` |
//! | `CollectionsMap`   | `{ "collections": { "Name": [ {card} ] } }`     |
//! | `CardsProperty`    | `{ "cards": [ {card}, ... ] }`                  |
//! | `Fallback`         | any object with an array value                  |
//!
//! The shape is detected once and everything downstream works on
//! [`NormalizedDocument`]. Card objects pass through untouched; only the
//! containers around them change.

use cardvault_types::Fields;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const COLLECTIONS_KEY: &str = "collections";
const CARDS_KEY: &str = "cards";
const SOLD_KEYS: [&str; 2] = ["soldCards", "soldItems"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("no cards found in document")]
    NoCardsFound,
}

/// Recognized document layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    ArrayOfCards,
    CardsProperty,
    CollectionsArray,
    CollectionsMap,
    Fallback,
}

/// A collection as described by the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCollection {
    /// Source id, when the document carried one.
    pub id: Option<String>,
    pub name: String,
    pub cards: Vec<Fields>,
}

/// The canonical record list produced from any recognized shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    pub shape: DocumentShape,
    pub collections: Vec<NormalizedCollection>,
    /// Cards that belong to no collection.
    pub loose_cards: Vec<Fields>,
    /// Entries found in card arrays that were not objects.
    pub rejected: usize,
}

impl NormalizedDocument {
    fn empty(shape: DocumentShape) -> Self {
        Self {
            shape,
            collections: Vec::new(),
            loose_cards: Vec::new(),
            rejected: 0,
        }
    }

    /// Number of cards across collections and loose cards.
    pub fn card_count(&self) -> usize {
        self.collections.iter().map(|c| c.cards.len()).sum::<usize>() + self.loose_cards.len()
    }

    /// Flattens every card into one list, collections first.
    pub fn into_all_cards(self) -> Vec<Fields> {
        let mut cards: Vec<Fields> = self.collections.into_iter().flat_map(|c| c.cards).collect();
        cards.extend(self.loose_cards);
        cards
    }
}

/// Sold items pulled out of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoldItemsDocument {
    pub items: Vec<Fields>,
    pub rejected: usize,
}

/// Detects the shape of a decoded document.
pub fn detect_shape(value: &Value) -> Result<DocumentShape, NormalizeError> {
    let map = match value {
        Value::Array(_) => return Ok(DocumentShape::ArrayOfCards),
        Value::Object(map) => map,
        _ => return Err(NormalizeError::NoCardsFound),
    };

    match map.get(COLLECTIONS_KEY) {
        Some(Value::Array(_)) => return Ok(DocumentShape::CollectionsArray),
        Some(Value::Object(_)) => return Ok(DocumentShape::CollectionsMap),
        _ => {}
    }
    if matches!(map.get(CARDS_KEY), Some(Value::Array(_))) {
        return Ok(DocumentShape::CardsProperty);
    }
    if fallback_key(map).is_some() {
        return Ok(DocumentShape::Fallback);
    }
    Err(NormalizeError::NoCardsFound)
}

/// Converts a decoded document into the canonical record list.
pub fn normalize(value: Value) -> Result<NormalizedDocument, NormalizeError> {
    let shape = detect_shape(&value)?;
    let mut doc = NormalizedDocument::empty(shape);

    let mut map = match value {
        Value::Array(items) => {
            doc.loose_cards = split_cards(items, &mut doc.rejected);
            return Ok(doc);
        }
        Value::Object(map) => map,
        _ => return Err(NormalizeError::NoCardsFound),
    };

    match shape {
        DocumentShape::CollectionsArray => {
            if let Some(Value::Array(entries)) = map.remove(COLLECTIONS_KEY) {
                for (index, entry) in entries.into_iter().enumerate() {
                    match entry {
                        Value::Object(mut entry) => {
                            let id = entry.get("id").and_then(id_string);
                            let name = entry
                                .get("name")
                                .and_then(Value::as_str)
                                .map(str::to_string);
                            let cards = match entry.remove(CARDS_KEY) {
                                Some(Value::Array(cards)) => split_cards(cards, &mut doc.rejected),
                                _ => Vec::new(),
                            };
                            doc.collections.push(NormalizedCollection {
                                id,
                                name: collection_name(name, index),
                                cards,
                            });
                        }
                        _ => doc.rejected += 1,
                    }
                }
            }
        }
        DocumentShape::CollectionsMap => {
            if let Some(Value::Object(entries)) = map.remove(COLLECTIONS_KEY) {
                for (index, (name, cards)) in entries.into_iter().enumerate() {
                    match cards {
                        Value::Array(cards) => doc.collections.push(NormalizedCollection {
                            id: None,
                            name: collection_name(Some(name), index),
                            cards: split_cards(cards, &mut doc.rejected),
                        }),
                        _ => debug!(collection = %name, "skipping non-array collection entry"),
                    }
                }
            }
        }
        DocumentShape::CardsProperty => {
            if let Some(Value::Array(cards)) = map.remove(CARDS_KEY) {
                doc.loose_cards = split_cards(cards, &mut doc.rejected);
            }
        }
        DocumentShape::Fallback => {
            let key = fallback_key(&map).map(str::to_string);
            if let Some(Value::Array(cards)) = key.and_then(|k| map.remove(&k)) {
                doc.loose_cards = split_cards(cards, &mut doc.rejected);
            }
        }
        DocumentShape::ArrayOfCards => {}
    }

    Ok(doc)
}

/// Removes an embedded sold-items array (`soldCards` or `soldItems`) from
/// an object document. Older exports stored sold items next to the
/// collections.
pub fn take_embedded_sold_items(value: &mut Value) -> Option<SoldItemsDocument> {
    let map = value.as_object_mut()?;
    let key = SOLD_KEYS
        .iter()
        .find(|key| matches!(map.get(**key), Some(Value::Array(_))))?;
    match map.remove(*key) {
        Some(Value::Array(items)) => Some(sold_items_from(items)),
        _ => None,
    }
}

/// Reads a dedicated sold-items document: a bare array or an object
/// wrapping one under `soldCards` / `soldItems`.
pub fn parse_sold_items(value: Value) -> Option<SoldItemsDocument> {
    match value {
        Value::Array(items) => Some(sold_items_from(items)),
        mut object @ Value::Object(_) => take_embedded_sold_items(&mut object),
        _ => None,
    }
}

fn sold_items_from(items: Vec<Value>) -> SoldItemsDocument {
    let mut rejected = 0;
    let items = split_cards(items, &mut rejected);
    SoldItemsDocument { items, rejected }
}

/// Keeps object entries, counting everything else as rejected.
fn split_cards(items: Vec<Value>, rejected: &mut usize) -> Vec<Fields> {
    let mut cards = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(fields) => cards.push(fields),
            _ => *rejected += 1,
        }
    }
    cards
}

/// First array-valued key in document order, ignoring sold-item keys.
fn fallback_key(map: &Fields) -> Option<&str> {
    map.iter()
        .find(|(key, value)| value.is_array() && !SOLD_KEYS.contains(&key.as_str()))
        .map(|(key, _)| key.as_str())
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn collection_name(name: Option<String>, index: usize) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => format!("Collection {}", index + 1),
    }
}
