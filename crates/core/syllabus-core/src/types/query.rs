//! Typed filter, query option and update expressions
//!
//! These replace the nested key/value shapes a document driver accepts.
//! Store backends translate them into their own query form.

use bson::{oid::ObjectId, Bson};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate selecting the records an operation applies to
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record
    All,
    /// Field equals value (any element, for array fields)
    Equals(String, Bson),
    /// Field matches a regular expression (any element, for array fields)
    MatchesPattern {
        /// Field path
        field: String,
        /// Regular expression source
        pattern: String,
        /// Match ignoring case
        case_insensitive: bool,
    },
    /// At least one sub-filter matches
    Or(Vec<Filter>),
    /// Every sub-filter matches
    And(Vec<Filter>),
}

impl Filter {
    /// Filter matching every record
    pub fn all() -> Self {
        Filter::All
    }

    /// Exact match
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Equals(field.into(), value.into())
    }

    /// Match on the record identifier
    pub fn id(id: ObjectId) -> Self {
        Filter::Equals("_id".to_string(), Bson::ObjectId(id))
    }

    /// Case-sensitive regular expression match
    pub fn pattern(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::MatchesPattern {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    /// Case-insensitive regular expression match (`/pattern/i`)
    pub fn pattern_ci(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::MatchesPattern {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    /// Logical OR across sub-filters
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Logical AND across sub-filters
    pub fn and_all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// Conjunction of `self` and `other`, flattening nested ANDs
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "{{}}"),
            Filter::Equals(field, value) => write!(f, "({} == {})", field, value),
            Filter::MatchesPattern {
                field,
                pattern,
                case_insensitive,
            } => {
                let flags = if *case_insensitive { "i" } else { "" };
                write!(f, "({} =~ /{}/{})", field, pattern, flags)
            }
            Filter::Or(filters) => write_joined(f, filters, " || "),
            Filter::And(filters) => write_joined(f, filters, " && "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, filters: &[Filter], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", filter)?;
    }
    write!(f, ")")
}

/// Sort direction for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

impl SortDirection {
    /// Driver-style numeric form (`1` / `-1`)
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// Projection, sort and paging for `find_many`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Include-only field set; `None` returns whole records
    pub projection: Option<Vec<String>>,
    /// Sort keys in priority order
    pub sort: Vec<(String, SortDirection)>,
    /// Maximum number of records returned
    pub limit: Option<u64>,
    /// Number of matching records skipped first
    pub skip: Option<u64>,
}

impl QueryOptions {
    /// Empty options: whole records, store order, no limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Return only these fields (plus `_id`)
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Append a sort key
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((field.into(), direction));
        self
    }

    /// Cap the number of results
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip leading results
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// One partial-update operation
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Add `by` to a numeric field (sets it when missing)
    Increment(String, Bson),
    /// Overwrite a field
    Set(String, Bson),
    /// Remove a field
    Unset(String),
}

impl UpdateOp {
    /// Field this operation touches
    pub fn field(&self) -> &str {
        match self {
            UpdateOp::Increment(field, _) | UpdateOp::Set(field, _) | UpdateOp::Unset(field) => {
                field
            }
        }
    }
}

/// Partial update applied in the store without loading records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Operations, applied in order
    pub ops: Vec<UpdateOp>,
}

impl Update {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a numeric field
    pub fn inc(mut self, field: impl Into<String>, by: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Increment(field.into(), by.into()));
        self
    }

    /// Overwrite a field
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    /// Remove a field
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    /// True when there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// First field targeted by more than one operation
    ///
    /// Stores apply an update as one document of operators, so a field may
    /// appear in it only once.
    pub fn repeated_field(&self) -> Option<&str> {
        self.ops.iter().enumerate().find_map(|(i, op)| {
            self.ops[..i]
                .iter()
                .any(|earlier| earlier.field() == op.field())
                .then(|| op.field())
        })
    }
}

/// Flags for `update_by_query`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Send the update to the store without schema checks
    pub skip_validation: bool,
}

impl UpdateOptions {
    /// Options that bypass schema checks
    pub fn unvalidated() -> Self {
        Self {
            skip_validation: true,
        }
    }
}

/// Counts reported by an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    /// Records the filter matched
    pub matched: u64,
    /// Records actually changed
    pub modified: u64,
}
