//! Course record types

use crate::{Result, SyllabusError};
use bson::{oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

/// Record identifier assigned by the store
pub type CourseId = ObjectId;

/// Parse a hex record identifier
pub fn parse_id(raw: &str) -> Result<CourseId> {
    ObjectId::parse_str(raw.trim()).map_err(|e| {
        SyllabusError::validation("_id", format!("Cast to ObjectId failed for value \"{}\": {}", raw, e))
    })
}

/// A stored Course, as returned by `create` and `find_by_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Store-assigned identifier
    #[serde(rename = "_id")]
    pub id: CourseId,

    /// Course name (required, non-empty)
    pub name: String,

    /// Author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Creation time unless explicitly overwritten
    pub date: DateTime,

    /// Publication flag; absent is distinct from `false`
    #[serde(rename = "isPublished", default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,

    /// Price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Optimistic concurrency version
    #[serde(rename = "__v", default)]
    pub version: i64,
}

impl Course {
    /// Decode a stored document
    pub fn from_document(doc: Document) -> Result<Self> {
        bson::from_document(doc)
            .map_err(|e| SyllabusError::storage(format!("Failed to decode course: {}", e)))
    }

    /// Encode for storage
    pub fn to_document(&self) -> Result<Document> {
        bson::to_document(self)
            .map_err(|e| SyllabusError::storage(format!("Failed to encode course: {}", e)))
    }

    /// Creation date as a chrono timestamp
    pub fn date_utc(&self) -> chrono::DateTime<chrono::Utc> {
        self.date.to_chrono()
    }
}

/// A possibly projected Course, as returned by `find_many`
///
/// Every field except the identifier is optional because a projection may
/// leave it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseView {
    /// Store-assigned identifier
    #[serde(rename = "_id")]
    pub id: CourseId,

    /// Course name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime>,

    /// Publication flag
    #[serde(rename = "isPublished", default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,

    /// Price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Stored version
    #[serde(rename = "__v", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl CourseView {
    /// Decode a stored (possibly projected) document
    pub fn from_document(doc: Document) -> Result<Self> {
        bson::from_document(doc)
            .map_err(|e| SyllabusError::storage(format!("Failed to decode course: {}", e)))
    }
}

impl From<Course> for CourseView {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            name: Some(course.name),
            author: course.author,
            tags: Some(course.tags),
            date: Some(course.date),
            is_published: course.is_published,
            price: course.price,
            version: Some(course.version),
        }
    }
}

/// Client-supplied fields for `create`
///
/// A typed front for the field document; anything left `None` is omitted
/// so the schema defaults apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCourse {
    /// Course name
    pub name: Option<String>,
    /// Author
    pub author: Option<String>,
    /// Tags
    pub tags: Option<Vec<String>>,
    /// Creation time; defaults to now
    pub date: Option<DateTime>,
    /// Publication flag
    pub is_published: Option<bool>,
    /// Price
    pub price: Option<f64>,
}

impl NewCourse {
    /// Start from a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set the author
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the tags
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Set the publication flag
    pub fn published(mut self, published: bool) -> Self {
        self.is_published = Some(published);
        self
    }

    /// Set the price
    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

impl From<NewCourse> for Document {
    fn from(course: NewCourse) -> Self {
        let mut doc = Document::new();
        if let Some(name) = course.name {
            doc.insert("name", name);
        }
        if let Some(author) = course.author {
            doc.insert("author", author);
        }
        if let Some(tags) = course.tags {
            doc.insert("tags", tags);
        }
        if let Some(date) = course.date {
            doc.insert("date", date);
        }
        if let Some(published) = course.is_published {
            doc.insert("isPublished", published);
        }
        if let Some(price) = course.price {
            doc.insert("price", price);
        }
        doc
    }
}
