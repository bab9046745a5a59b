//! Record schema: field kinds, defaults, required-ness and write-time coercion

use super::query::{Update, UpdateOp};
use crate::{Result, SyllabusError};
use bson::{Bson, DateTime, Document};
use once_cell::sync::Lazy;
use tracing::debug;

/// Identifier key written by the store
pub const ID_KEY: &str = "_id";

/// Optimistic concurrency version key
pub const VERSION_KEY: &str = "__v";

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text
    String,
    /// Double-precision number
    Number,
    /// Boolean
    Boolean,
    /// Timestamp
    Date,
    /// Ordered sequence of text
    StringArray,
}

impl FieldKind {
    fn label(self) -> &'static str {
        match self {
            FieldKind::String => "String",
            FieldKind::Number => "Number",
            FieldKind::Boolean => "Boolean",
            FieldKind::Date => "Date",
            FieldKind::StringArray => "[String]",
        }
    }
}

/// Value a field takes when omitted at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Current time
    Now,
    /// Empty sequence
    EmptyArray,
}

impl FieldDefault {
    fn value(self) -> Bson {
        match self {
            FieldDefault::Now => Bson::DateTime(DateTime::now()),
            FieldDefault::EmptyArray => Bson::Array(Vec::new()),
        }
    }
}

/// One declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Stored field name
    pub name: &'static str,
    /// Declared type
    pub kind: FieldKind,
    /// Must be present (and non-empty, for text) at persistence time
    pub required: bool,
    /// Default applied at creation
    pub default: Option<FieldDefault>,
}

impl FieldSpec {
    /// Optional field with no default
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    /// Required field
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    /// Attach a default
    pub const fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Whether a stored record may lack this field
    pub const fn removable(&self) -> bool {
        !self.required && self.default.is_none()
    }
}

/// Declared shape of a model and its collection
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Model name
    pub model: &'static str,
    /// Backing collection
    pub collection: &'static str,
    /// Declared fields, in declaration order
    pub fields: Vec<FieldSpec>,
}

/// The Course model
pub static COURSE_SCHEMA: Lazy<Schema> = Lazy::new(|| Schema {
    model: "Course",
    collection: "courses",
    fields: vec![
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("author", FieldKind::String),
        FieldSpec::optional("tags", FieldKind::StringArray).with_default(FieldDefault::EmptyArray),
        FieldSpec::optional("date", FieldKind::Date).with_default(FieldDefault::Now),
        FieldSpec::optional("isPublished", FieldKind::Boolean),
        FieldSpec::optional("price", FieldKind::Number),
    ],
});

impl Schema {
    /// Look up a declared field
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Refuse to drop a field that every stored record must carry
    ///
    /// Undeclared fields may always go.
    pub fn check_removable(&self, field: &str) -> Result<()> {
        match self.field(field) {
            Some(spec) => check_removable(spec),
            None => Ok(()),
        }
    }

    /// Turn client-supplied fields into a document ready for insertion
    ///
    /// Drops undeclared fields, coerces values, applies defaults, checks
    /// required fields and starts the version at 0. `_id` is kept when the
    /// caller supplied one.
    pub fn prepare_new(&self, fields: Document) -> Result<Document> {
        let mut doc = Document::new();

        if let Some(id) = fields.get(ID_KEY) {
            match id {
                Bson::ObjectId(_) => {
                    doc.insert(ID_KEY, id.clone());
                }
                Bson::Null => {}
                other => {
                    return Err(SyllabusError::validation(
                        ID_KEY,
                        format!("Cast to ObjectId failed for value {}", other),
                    ))
                }
            }
        }

        for (key, value) in fields {
            if key == ID_KEY || key == VERSION_KEY {
                continue;
            }
            match self.field(&key) {
                Some(spec) => {
                    if let Some(value) = coerce(spec, value)? {
                        doc.insert(key, value);
                    }
                }
                None => debug!("Dropping undeclared field '{}' on {}", key, self.model),
            }
        }

        for spec in &self.fields {
            if !doc.contains_key(spec.name) {
                if let Some(default) = spec.default {
                    doc.insert(spec.name, default.value());
                }
            }
        }

        self.check_required(&doc)?;
        doc.insert(VERSION_KEY, 0i64);
        Ok(doc)
    }

    /// Coerce and check a complete record before it is saved
    ///
    /// System fields pass through untouched; undeclared fields are dropped.
    pub fn validate(&self, doc: Document) -> Result<Document> {
        let mut out = Document::new();
        for (key, value) in doc {
            if key == ID_KEY || key == VERSION_KEY {
                out.insert(key, value);
                continue;
            }
            match self.field(&key) {
                Some(spec) => {
                    if let Some(value) = coerce(spec, value)? {
                        out.insert(key, value);
                    }
                }
                None => debug!("Dropping undeclared field '{}' on {}", key, self.model),
            }
        }
        self.check_required(&out)?;
        Ok(out)
    }

    /// Check and coerce a partial update
    ///
    /// `Set` values are coerced to the declared kind, `Increment` must target
    /// a number and carry a numeric amount, and required or system fields can
    /// neither be unset nor touched respectively.
    pub fn check_update(&self, update: &Update) -> Result<Update> {
        if let Some(field) = update.repeated_field() {
            return Err(repeated_error(field));
        }

        let mut checked = Update::new();
        for op in &update.ops {
            let field = op.field();
            if field == ID_KEY || field == VERSION_KEY {
                return Err(SyllabusError::validation(
                    field,
                    "System fields cannot be updated",
                ));
            }
            let spec = self.field(field).ok_or_else(|| {
                SyllabusError::validation(
                    field,
                    format!("Field is not declared on {}", self.model),
                )
            })?;

            match op {
                UpdateOp::Increment(_, by) => {
                    if spec.kind != FieldKind::Number {
                        return Err(SyllabusError::validation(
                            field,
                            format!("Cannot increment a {} field", spec.kind.label()),
                        ));
                    }
                    if !is_number(by) {
                        return Err(SyllabusError::validation(
                            field,
                            format!("Increment amount must be numeric, got {}", by),
                        ));
                    }
                    checked.ops.push(op.clone());
                }
                UpdateOp::Set(_, value) => match coerce(spec, value.clone())? {
                    Some(value) => {
                        if spec.required {
                            check_present(spec, &value)?;
                        }
                        checked.ops.push(UpdateOp::Set(field.to_string(), value));
                    }
                    None => {
                        check_removable(spec)?;
                        checked.ops.push(UpdateOp::Unset(field.to_string()));
                    }
                },
                UpdateOp::Unset(_) => {
                    check_removable(spec)?;
                    checked.ops.push(op.clone());
                }
            }
        }
        Ok(checked)
    }

    fn check_required(&self, doc: &Document) -> Result<()> {
        for spec in self.fields.iter().filter(|f| f.required) {
            match doc.get(spec.name) {
                Some(value) => check_present(spec, value)?,
                None => return Err(required_error(spec.name)),
            }
        }
        Ok(())
    }
}

fn check_removable(spec: &FieldSpec) -> Result<()> {
    if spec.required {
        return Err(required_error(spec.name));
    }
    if spec.default.is_some() {
        return Err(SyllabusError::validation(
            spec.name,
            format!("Path `{}` has a default and cannot be removed.", spec.name),
        ));
    }
    Ok(())
}

fn repeated_error(field: &str) -> SyllabusError {
    SyllabusError::validation(
        field,
        format!("Updating the path '{}' would create a conflict at '{}'", field, field),
    )
}

fn required_error(field: &str) -> SyllabusError {
    SyllabusError::validation(field, format!("Path `{}` is required.", field))
}

fn check_present(spec: &FieldSpec, value: &Bson) -> Result<()> {
    match value {
        Bson::String(s) if s.is_empty() => Err(required_error(spec.name)),
        Bson::Null => Err(required_error(spec.name)),
        _ => Ok(()),
    }
}

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn cast_error(spec: &FieldSpec, value: &Bson) -> SyllabusError {
    SyllabusError::validation(
        spec.name,
        format!(
            "Cast to {} failed for value {} at path \"{}\"",
            spec.kind.label(),
            value,
            spec.name
        ),
    )
}

/// Coerce a value to the field's declared kind
///
/// `Ok(None)` means the value counts as absent.
pub fn coerce(spec: &FieldSpec, value: Bson) -> Result<Option<Bson>> {
    if matches!(value, Bson::Null | Bson::Undefined) {
        return Ok(None);
    }
    let coerced = match spec.kind {
        FieldKind::String => Some(to_text(&value).ok_or_else(|| cast_error(spec, &value))?),
        FieldKind::Number => to_number(&value).map_err(|_| cast_error(spec, &value))?,
        FieldKind::Boolean => Some(to_boolean(&value).ok_or_else(|| cast_error(spec, &value))?),
        FieldKind::Date => Some(to_date(&value).ok_or_else(|| cast_error(spec, &value))?),
        FieldKind::StringArray => {
            let items = match &value {
                Bson::Array(items) => items
                    .iter()
                    .filter(|item| !matches!(item, Bson::Null))
                    .map(|item| to_text(item).ok_or_else(|| cast_error(spec, item)))
                    .collect::<Result<Vec<_>>>()?,
                scalar => vec![to_text(scalar).ok_or_else(|| cast_error(spec, scalar))?],
            };
            Some(Bson::Array(items))
        }
    };
    Ok(coerced)
}

fn to_text(value: &Bson) -> Option<Bson> {
    let text = match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(n) => format_number(*n),
        Bson::Boolean(b) => b.to_string(),
        Bson::ObjectId(id) => id.to_hex(),
        _ => return None,
    };
    Some(Bson::String(text))
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn to_number(value: &Bson) -> std::result::Result<Option<Bson>, ()> {
    let n = match value {
        Bson::Int32(n) => f64::from(*n),
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        Bson::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Bson::String(s) if s.trim().is_empty() => return Ok(None),
        Bson::String(s) => s.trim().parse::<f64>().map_err(|_| ())?,
        _ => return Err(()),
    };
    if n.is_nan() {
        return Err(());
    }
    Ok(Some(Bson::Double(n)))
}

fn to_boolean(value: &Bson) -> Option<Bson> {
    let b = match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(1) | Bson::Int64(1) => true,
        Bson::Int32(0) | Bson::Int64(0) => false,
        Bson::Double(n) if *n == 1.0 => true,
        Bson::Double(n) if *n == 0.0 => false,
        Bson::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(Bson::Boolean(b))
}

fn to_date(value: &Bson) -> Option<Bson> {
    let date = match value {
        Bson::DateTime(dt) => *dt,
        Bson::String(s) => DateTime::parse_rfc3339_str(s.trim()).ok()?,
        Bson::Int64(ms) => DateTime::from_millis(*ms),
        Bson::Int32(ms) => DateTime::from_millis(i64::from(*ms)),
        Bson::Double(ms) if ms.is_finite() => DateTime::from_millis(*ms as i64),
        _ => return None,
    };
    Some(Bson::DateTime(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc, oid::ObjectId};

    #[test]
    fn test_prepare_new_applies_defaults() {
        let doc = COURSE_SCHEMA
            .prepare_new(doc! { "name": "React Course", "author": "Daniel" })
            .unwrap();

        assert_eq!(doc.get_str("name").unwrap(), "React Course");
        assert!(matches!(doc.get("date"), Some(Bson::DateTime(_))));
        assert_eq!(doc.get_array("tags").unwrap().len(), 0);
        assert_eq!(doc.get_i64(VERSION_KEY).unwrap(), 0);
        assert!(!doc.contains_key("isPublished"));
        assert!(!doc.contains_key("price"));
    }

    #[test]
    fn test_prepare_new_requires_name() {
        let err = COURSE_SCHEMA
            .prepare_new(doc! { "author": "Daniel" })
            .unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = COURSE_SCHEMA.prepare_new(doc! { "name": "" }).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = COURSE_SCHEMA
            .prepare_new(doc! { "name": Bson::Null })
            .unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn test_prepare_new_coerces_values() {
        let doc = COURSE_SCHEMA
            .prepare_new(doc! {
                "name": 101,
                "tags": "backend",
                "isPublished": "true",
                "price": "15.5",
                "date": "2021-04-15T10:00:00Z",
            })
            .unwrap();

        assert_eq!(doc.get_str("name").unwrap(), "101");
        assert_eq!(doc.get_array("tags").unwrap(), &vec![Bson::String("backend".into())]);
        assert!(doc.get_bool("isPublished").unwrap());
        assert_eq!(doc.get_f64("price").unwrap(), 15.5);
        assert_eq!(
            doc.get_datetime("date").unwrap().try_to_rfc3339_string().unwrap(),
            "2021-04-15T10:00:00Z"
        );
    }

    #[test]
    fn test_prepare_new_rejects_uncoercible() {
        let err = COURSE_SCHEMA
            .prepare_new(doc! { "name": "x", "price": "cheap" })
            .unwrap_err();
        assert_eq!(err.field(), Some("price"));

        let err = COURSE_SCHEMA
            .prepare_new(doc! { "name": "x", "isPublished": "maybe" })
            .unwrap_err();
        assert_eq!(err.field(), Some("isPublished"));

        let err = COURSE_SCHEMA
            .prepare_new(doc! { "name": "x", "tags": [{ "nested": 1 }] })
            .unwrap_err();
        assert_eq!(err.field(), Some("tags"));
    }

    #[test]
    fn test_prepare_new_drops_undeclared_and_keeps_id() {
        let id = ObjectId::new();
        let doc = COURSE_SCHEMA
            .prepare_new(doc! { "_id": id, "name": "x", "rating": 5, "__v": 7 })
            .unwrap();

        assert_eq!(doc.get_object_id(ID_KEY).unwrap(), id);
        assert!(!doc.contains_key("rating"));
        assert_eq!(doc.get_i64(VERSION_KEY).unwrap(), 0);
    }

    #[test]
    fn test_explicit_date_wins_over_default() {
        let date = DateTime::from_millis(1_000);
        let doc = COURSE_SCHEMA
            .prepare_new(doc! { "name": "x", "date": date })
            .unwrap();
        assert_eq!(doc.get_datetime("date").unwrap(), &date);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let err = COURSE_SCHEMA
            .validate(doc! { "_id": ObjectId::new(), "name": "", "__v": 0i64 })
            .unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn test_check_update() {
        let update = Update::new()
            .inc("price", 33)
            .set("isPublished", "false")
            .set("author", Bson::Null);
        let checked = COURSE_SCHEMA.check_update(&update).unwrap();

        assert_eq!(checked.ops[0], UpdateOp::Increment("price".into(), bson!(33)));
        assert_eq!(checked.ops[1], UpdateOp::Set("isPublished".into(), Bson::Boolean(false)));
        assert_eq!(checked.ops[2], UpdateOp::Unset("author".into()));
    }

    #[test]
    fn test_check_update_rejections() {
        let schema = &*COURSE_SCHEMA;

        let err = schema.check_update(&Update::new().inc("name", 1)).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = schema.check_update(&Update::new().inc("price", "lots")).unwrap_err();
        assert_eq!(err.field(), Some("price"));

        let err = schema.check_update(&Update::new().unset("name")).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = schema.check_update(&Update::new().set("name", "")).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = schema.check_update(&Update::new().set("price", "free")).unwrap_err();
        assert_eq!(err.field(), Some("price"));

        let err = schema.check_update(&Update::new().set("rating", 5)).unwrap_err();
        assert_eq!(err.field(), Some("rating"));

        let err = schema.check_update(&Update::new().set("__v", 5)).unwrap_err();
        assert_eq!(err.field(), Some("__v"));
    }

    #[test]
    fn test_check_update_keeps_defaulted_fields() {
        let schema = &*COURSE_SCHEMA;

        let err = schema.check_update(&Update::new().unset("date")).unwrap_err();
        assert_eq!(err.field(), Some("date"));

        let err = schema.check_update(&Update::new().set("date", Bson::Null)).unwrap_err();
        assert_eq!(err.field(), Some("date"));

        let err = schema.check_update(&Update::new().unset("tags")).unwrap_err();
        assert_eq!(err.field(), Some("tags"));

        assert!(schema.check_update(&Update::new().set("tags", bson!([]))).is_ok());
        assert!(schema.check_update(&Update::new().unset("price")).is_ok());
        assert!(schema.check_removable("author").is_ok());
        assert!(schema.check_removable("level").is_ok());
        assert!(schema.check_removable("date").is_err());
    }

    #[test]
    fn test_check_update_rejects_repeated_field() {
        let update = Update::new().inc("price", 1).inc("price", 2);
        let err = COURSE_SCHEMA.check_update(&update).unwrap_err();
        assert_eq!(err.field(), Some("price"));

        let update = Update::new().set("author", "Daniel").unset("author");
        let err = COURSE_SCHEMA.check_update(&update).unwrap_err();
        assert_eq!(err.field(), Some("author"));
    }
}
