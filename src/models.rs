use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

// --- Vocabulary ---

/// Subject
///
/// The closed set of school subjects a document can be filed under.
/// Anything outside this set is coerced to `Chung` ("General").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Subject {
    #[serde(rename = "Toán")]
    Toan,
    #[serde(rename = "Lý")]
    Ly,
    #[serde(rename = "Hóa")]
    Hoa,
    #[serde(rename = "Sinh")]
    Sinh,
    #[serde(rename = "Tin")]
    Tin,
    #[serde(rename = "Sử")]
    Su,
    #[serde(rename = "Văn")]
    Van,
    #[serde(rename = "Tiếng Anh")]
    TiengAnh,
    #[default]
    #[serde(rename = "Chung")]
    Chung,
}

impl Subject {
    /// Menu order.
    pub const ALL: [Subject; 9] = [
        Subject::Toan,
        Subject::Ly,
        Subject::Hoa,
        Subject::Sinh,
        Subject::Tin,
        Subject::Su,
        Subject::Van,
        Subject::TiengAnh,
        Subject::Chung,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Subject::Toan => "Toán",
            Subject::Ly => "Lý",
            Subject::Hoa => "Hóa",
            Subject::Sinh => "Sinh",
            Subject::Tin => "Tin",
            Subject::Su => "Sử",
            Subject::Van => "Văn",
            Subject::TiengAnh => "Tiếng Anh",
            Subject::Chung => "Chung",
        }
    }

    /// Exact label match. No case folding: the stored labels are canonical.
    pub fn parse(label: &str) -> Option<Subject> {
        Subject::ALL.into_iter().find(|s| s.label() == label)
    }

    /// Total variant of `parse`: unknown labels become the default tag.
    pub fn coerce(label: &str) -> Subject {
        Subject::parse(label.trim()).unwrap_or_default()
    }

    pub fn labels() -> Vec<&'static str> {
        Subject::ALL.iter().map(|s| s.label()).collect()
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Visibility
///
/// Which bucket a document lives in. Private documents are only reachable
/// through their access key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    /// Form semantics: only the literal "private" selects the private bucket.
    pub fn from_form_value(value: &str) -> Visibility {
        if value.trim() == "private" {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

// --- Core Schemas ---

/// Document
///
/// A single link on the board. Only the repository constructs these; callers
/// submit a `NewDocument` and receive an id they never chose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Document {
    #[schema(example = "3f9a1c0b7d2e4a55")]
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Subject,

    /// Minute precision, persisted as `dd/mm/YYYY HH:MM`.
    #[serde(with = "minute_timestamp")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "01/01/2024 10:00")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub visibility: Visibility,

    // Older records store the key under "key".
    #[serde(default, alias = "key", skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
}

/// Collection
///
/// The canonical two-bucket shape every backend is normalized into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Collection {
    pub public: Vec<Document>,
    pub private: Vec<Document>,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && self.private.is_empty()
    }

    pub fn len(&self) -> usize {
        self.public.len() + self.private.len()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.public.iter().chain(self.private.iter()).any(|d| d.id == id)
    }

    pub fn find_private(&self, id: &str) -> Option<&Document> {
        self.private.iter().find(|d| d.id == id)
    }

    pub fn stats(&self) -> DataStats {
        DataStats {
            public_docs: self.public.len(),
            private_docs: self.private.len(),
        }
    }

    /// Keeps only documents filed under `subject`, preserving order.
    pub fn filtered(&self, subject: Subject) -> Collection {
        Collection {
            public: self.public.iter().filter(|d| d.category == subject).cloned().collect(),
            private: self.private.iter().filter(|d| d.category == subject).cloned().collect(),
        }
    }
}

// --- Request Payloads ---

/// NewDocument
///
/// Caller-supplied fields for a document. Shared by the admin HTML form and the
/// JSON API; the form names the visibility field `type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(example = "Toán")]
    pub category: String,
    #[serde(
        rename = "type",
        alias = "visibility",
        default,
        deserialize_with = "lenient_visibility"
    )]
    pub visibility: Visibility,
}

fn lenient_visibility<'de, D>(deserializer: D) -> Result<Visibility, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Visibility::from_form_value).unwrap_or_default())
}

/// Query string for the JSON listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SubjectFilter {
    /// Exact subject label; an unknown label yields an empty listing.
    pub subject: Option<String>,
}

// --- Response Payloads ---

/// ApiMessage
///
/// Envelope returned by the mutating JSON endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
    /// Present only when a private document was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), key: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), key: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DataStats {
    pub public_docs: usize,
    pub private_docs: usize,
}

/// HealthResponse
///
/// `data_stats` is omitted when the store could not be read.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_stats: Option<DataStats>,
}

/// What anonymous clients may see of a private document.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Subject,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    #[serde(with = "minute_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            category: doc.category,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Listing {
    pub public: Vec<Document>,
    pub private: Vec<DocumentSummary>,
}

impl From<&Collection> for Listing {
    fn from(collection: &Collection) -> Self {
        Self {
            public: collection.public.clone(),
            private: collection.private.iter().map(DocumentSummary::from).collect(),
        }
    }
}

// --- Timestamps ---

/// Display and persistence format for `created_at`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts the persisted format, RFC 3339, and the `YYYY-mm-dd HH:MM:SS` form
/// relational exports produce. The result is always minute-truncated.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|n| n.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc)))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()))
        .ok()
        .map(truncate_to_minute)
}

pub mod minute_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("unrecognized timestamp: {raw}")))
    }
}
