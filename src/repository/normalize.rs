use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::models::{Collection, Document, Subject, Visibility, parse_timestamp};

/// RawShape
///
/// Classification of whatever a backend handed back before it is coerced into
/// a `Collection`.
#[derive(Debug, Clone, Copy)]
pub enum RawShape<'a> {
    /// `null`, a missing file, or any scalar.
    Absent,
    /// A bare array; every entry is public.
    Sequence(&'a [Value]),
    /// An object with (possibly) `public` / `private` members.
    Mapping(&'a Map<String, Value>),
    /// An object carrying the collection under `record`, as document stores answer.
    Wrapped(&'a Value),
}

impl<'a> RawShape<'a> {
    pub fn classify(raw: &'a Value) -> Self {
        match raw {
            Value::Array(items) => RawShape::Sequence(items),
            Value::Object(map) => match map.get("record") {
                Some(inner) => RawShape::Wrapped(inner),
                None => RawShape::Mapping(map),
            },
            _ => RawShape::Absent,
        }
    }
}

/// Outcome of a normalization pass. `dropped` counts entries that could not be
/// turned into a document: not an object, no usable id, or a repeated id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub collection: Collection,
    pub dropped: usize,
}

/// Coerces any loosely shaped value into the canonical two-bucket collection.
/// Pure and total.
pub fn normalize(raw: &Value) -> Collection {
    normalize_report(raw).collection
}

pub fn normalize_report(raw: &Value) -> Normalized {
    let shape = match RawShape::classify(raw) {
        // A single level of indirection is unwrapped; a record inside a record
        // is read as a plain mapping.
        RawShape::Wrapped(inner) => match RawShape::classify(inner) {
            RawShape::Wrapped(_) => match inner {
                Value::Object(map) => RawShape::Mapping(map),
                _ => RawShape::Absent,
            },
            other => other,
        },
        other => other,
    };

    let (public, private) = match shape {
        RawShape::Absent | RawShape::Wrapped(_) => (NO_ENTRIES, NO_ENTRIES),
        RawShape::Sequence(items) => (items, NO_ENTRIES),
        RawShape::Mapping(map) => (bucket(map, "public"), bucket(map, "private")),
    };

    let mut seen = HashSet::new();
    let mut out = Normalized::default();

    for (entries, visibility) in [(public, Visibility::Public), (private, Visibility::Private)] {
        for entry in entries {
            match document_from_value(entry, visibility) {
                Some(doc) if seen.insert(doc.id.clone()) => match visibility {
                    Visibility::Public => out.collection.public.push(doc),
                    Visibility::Private => out.collection.private.push(doc),
                },
                _ => out.dropped += 1,
            }
        }
    }

    out
}

const NO_ENTRIES: &[Value] = &[];

/// Non-list members count as empty.
fn bucket<'a>(map: &'a Map<String, Value>, name: &str) -> &'a [Value] {
    match map.get(name) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => NO_ENTRIES,
    }
}

fn text_field(obj: &Map<String, Value>, name: &str) -> Option<String> {
    obj.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strings and numbers both count as ids; older exports stored numeric ones.
fn id_field(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        _ => text_field(obj, "id"),
    }
}

/// The bucket decides visibility; any `visibility`/`doc_type` on the entry is ignored.
/// Only entries without a usable id are rejected. A private entry without a
/// key is kept and simply cannot be unlocked.
fn document_from_value(value: &Value, visibility: Visibility) -> Option<Document> {
    let obj = value.as_object()?;

    let access_key = match visibility {
        Visibility::Private => text_field(obj, "access_key").or_else(|| text_field(obj, "key")),
        Visibility::Public => None,
    };

    Some(Document {
        id: id_field(obj)?,
        title: text_field(obj, "title").unwrap_or_default(),
        url: text_field(obj, "url").unwrap_or_default(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        category: obj
            .get("category")
            .and_then(Value::as_str)
            .map(Subject::coerce)
            .unwrap_or_default(),
        created_at: obj
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        visibility,
        access_key,
    })
}
