//! Filter, sort, projection and update evaluation over BSON documents
//!
//! Mirrors the document store's semantics closely enough that the same
//! repository code behaves identically on both backends: array fields match
//! when any element matches, numbers compare by value across integer and
//! double types, and sorting follows the BSON type order.

use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use syllabus_core::bson::{Bson, Document};
use syllabus_core::{Filter, Result, SortDirection, SyllabusError, Update, UpdateOp};

/// A filter with its regular expressions compiled
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Matches everything
    All,
    /// Field equals value
    Equals(String, Bson),
    /// Field matches the expression
    Pattern(String, Regex),
    /// Any sub-predicate matches
    Or(Vec<Predicate>),
    /// Every sub-predicate matches
    And(Vec<Predicate>),
}

impl Predicate {
    /// Compile a filter; malformed patterns are a storage error
    pub fn compile(filter: &Filter) -> Result<Self> {
        Ok(match filter {
            Filter::All => Predicate::All,
            Filter::Equals(field, value) => Predicate::Equals(field.clone(), value.clone()),
            Filter::MatchesPattern {
                field,
                pattern,
                case_insensitive,
            } => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| {
                        SyllabusError::storage(format!("Invalid regular expression /{}/: {}", pattern, e))
                    })?;
                Predicate::Pattern(field.clone(), regex)
            }
            Filter::Or(filters) => {
                if filters.is_empty() {
                    return Err(SyllabusError::storage("$or requires at least one filter"));
                }
                Predicate::Or(filters.iter().map(Predicate::compile).collect::<Result<_>>()?)
            }
            Filter::And(filters) => {
                Predicate::And(filters.iter().map(Predicate::compile).collect::<Result<_>>()?)
            }
        })
    }

    /// Evaluate against one document
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals(field, expected) => match lookup(doc, field) {
                None => matches!(expected, Bson::Null),
                Some(Bson::Array(items)) => {
                    matches!(expected, Bson::Array(whole) if whole == items)
                        || items.iter().any(|item| values_equal(item, expected))
                }
                Some(value) => values_equal(value, expected),
            },
            Predicate::Pattern(field, regex) => match lookup(doc, field) {
                Some(Bson::String(s)) => regex.is_match(s),
                Some(Bson::Array(items)) => items
                    .iter()
                    .any(|item| matches!(item, Bson::String(s) if regex.is_match(s))),
                _ => false,
            },
            Predicate::Or(predicates) => predicates.iter().any(|p| p.matches(doc)),
            Predicate::And(predicates) => predicates.iter().all(|p| p.matches(doc)),
        }
    }
}

/// Resolve a dotted field path
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_document()?.get(part)?;
    }
    Some(current)
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Equality with numbers compared by value
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 2,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(Bson::Timestamp(_)) => 10,
        Some(Bson::RegularExpression(_)) => 11,
        Some(_) => 12,
    }
}

/// Total order over BSON values, missing sorting with `null`
pub fn compare(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(x), Some(y)) => match (x, y) {
            (Bson::String(s), Bson::String(t)) => s.cmp(t),
            (Bson::ObjectId(s), Bson::ObjectId(t)) => s.bytes().cmp(&t.bytes()),
            (Bson::Boolean(s), Bson::Boolean(t)) => s.cmp(t),
            (Bson::DateTime(s), Bson::DateTime(t)) => s.cmp(t),
            (Bson::Array(s), Bson::Array(t)) => compare_seq(s.iter(), t.iter()),
            (Bson::Document(s), Bson::Document(t)) => {
                for ((ks, vs), (kt, vt)) in s.iter().zip(t.iter()) {
                    let ord = ks.cmp(kt).then_with(|| compare(Some(vs), Some(vt)));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                s.len().cmp(&t.len())
            }
            _ => match (as_number(x), as_number(y)) {
                (Some(m), Some(n)) => m.partial_cmp(&n).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
        _ => Ordering::Equal,
    }
}

fn compare_seq<'a>(
    mut left: impl Iterator<Item = &'a Bson>,
    mut right: impl Iterator<Item = &'a Bson>,
) -> Ordering {
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => {
                let ord = compare(Some(x), Some(y));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Value an array field sorts by: its smallest element ascending, largest descending
fn sort_key<'a>(value: Option<&'a Bson>, direction: SortDirection) -> Option<&'a Bson> {
    match value {
        Some(Bson::Array(items)) => {
            let mut elements = items.iter();
            let first = elements.next()?;
            Some(elements.fold(first, |best, item| {
                let ord = compare(Some(item), Some(best));
                let better = match direction {
                    SortDirection::Ascending => ord == Ordering::Less,
                    SortDirection::Descending => ord == Ordering::Greater,
                };
                if better {
                    item
                } else {
                    best
                }
            }))
        }
        other => other,
    }
}

/// Stable multi-key sort; ties keep store order
pub fn sort_documents(docs: &mut [Document], keys: &[(String, SortDirection)]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, direction) in keys {
            let ord = compare(
                sort_key(lookup(a, field), *direction),
                sort_key(lookup(b, field), *direction),
            );
            let ord = match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Keep `_id` and the listed top-level fields, in document order
///
/// An empty list keeps everything.
pub fn project(doc: &Document, fields: &[String]) -> Document {
    if fields.is_empty() {
        return doc.clone();
    }
    doc.iter()
        .filter(|(key, _)| key.as_str() == "_id" || fields.iter().any(|f| f == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn increment(current: &Bson, by: &Bson, field: &str) -> Result<Bson> {
    let overflow = || SyllabusError::storage(format!("Increment of '{}' overflowed", field));
    Ok(match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        },
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(i64::from(*b)).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        _ => match (as_number(current), as_number(by)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => {
                return Err(SyllabusError::storage(format!(
                    "Cannot apply $inc to a value of non-numeric type. Field '{}' has value {}",
                    field, current
                )))
            }
        },
    })
}

/// Apply an update to one document; returns whether anything changed
///
/// On error the document is left as it was.
pub fn apply_update(doc: &mut Document, update: &Update) -> Result<bool> {
    let mut working = doc.clone();
    for op in &update.ops {
        match op {
            UpdateOp::Increment(field, by) => {
                if as_number(by).is_none() {
                    return Err(SyllabusError::storage(format!(
                        "Cannot increment '{}' with non-numeric argument {}",
                        field, by
                    )));
                }
                let next = match working.get(field) {
                    Some(current) => increment(current, by, field)?,
                    None => by.clone(),
                };
                working.insert(field.clone(), next);
            }
            UpdateOp::Set(field, value) => {
                working.insert(field.clone(), value.clone());
            }
            UpdateOp::Unset(field) => {
                working.remove(field);
            }
        }
    }
    if field_changes(doc, &working) {
        *doc = working;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn field_changes(before: &Document, after: &Document) -> bool {
    before.len() != after.len()
        || after
            .iter()
            .any(|(key, value)| before.get(key) != Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabus_core::bson::{doc, oid::ObjectId};

    fn course(name: &str, tags: &[&str], published: bool) -> Document {
        doc! {
            "_id": ObjectId::new(),
            "name": name,
            "tags": tags.iter().map(|t| Bson::String(t.to_string())).collect::<Vec<_>>(),
            "isPublished": published,
        }
    }

    #[test]
    fn test_pattern_matches_any_array_element() {
        let predicate = Predicate::compile(&Filter::pattern_ci("tags", "backend")).unwrap();
        assert!(predicate.matches(&course("Node", &["node", "BackEnd"], true)));
        assert!(!predicate.matches(&course("React", &["react", "frontend"], true)));
    }

    #[test]
    fn test_pattern_respects_case_flag() {
        let predicate = Predicate::compile(&Filter::pattern("name", "^node")).unwrap();
        assert!(predicate.matches(&course("node basics", &[], true)));
        assert!(!predicate.matches(&course("Node Basics", &[], true)));
    }

    #[test]
    fn test_equals_semantics() {
        let doc = doc! { "_id": 1, "tags": ["a", "b"], "price": 20.0, "author": Bson::Null };

        let eq = |field: &str, value: Bson| {
            Predicate::compile(&Filter::Equals(field.to_string(), value))
                .unwrap()
                .matches(&doc)
        };

        assert!(eq("tags", Bson::String("b".into())));
        assert!(eq("tags", Bson::Array(vec!["a".into(), "b".into()])));
        assert!(eq("price", Bson::Int32(20)));
        assert!(eq("author", Bson::Null));
        assert!(eq("missing", Bson::Null));
        assert!(!eq("missing", Bson::Boolean(false)));
    }

    #[test]
    fn test_or_and_combinations() {
        let filter = Filter::or([
            Filter::eq("name", "React Course"),
            Filter::pattern_ci("tags", "backend"),
        ])
        .and(Filter::eq("isPublished", true));
        let predicate = Predicate::compile(&filter).unwrap();

        assert!(predicate.matches(&course("React Course", &[], true)));
        assert!(predicate.matches(&course("Node", &["backend"], true)));
        assert!(!predicate.matches(&course("Node", &["backend"], false)));
        assert!(!predicate.matches(&course("Vue", &["frontend"], true)));
    }

    #[test]
    fn test_invalid_pattern_is_storage_error() {
        let err = Predicate::compile(&Filter::pattern("name", "(unclosed")).unwrap_err();
        assert!(matches!(err, SyllabusError::Storage(_)));

        let err = Predicate::compile(&Filter::Or(vec![])).unwrap_err();
        assert!(matches!(err, SyllabusError::Storage(_)));
    }

    #[test]
    fn test_sort_orders_types_and_keeps_ties_stable() {
        let mut docs = vec![
            doc! { "i": 0, "name": "b" },
            doc! { "i": 1 },
            doc! { "i": 2, "name": "a" },
            doc! { "i": 3, "name": 5 },
            doc! { "i": 4, "name": "a" },
        ];
        sort_documents(&mut docs, &[("name".to_string(), SortDirection::Ascending)]);
        let order: Vec<i32> = docs.iter().map(|d| d.get_i32("i").unwrap()).collect();
        assert_eq!(order, vec![1, 3, 2, 4, 0]);

        sort_documents(&mut docs, &[("name".to_string(), SortDirection::Descending)]);
        let order: Vec<i32> = docs.iter().map(|d| d.get_i32("i").unwrap()).collect();
        assert_eq!(order, vec![0, 2, 4, 3, 1]);
    }

    #[test]
    fn test_sort_by_array_uses_min_or_max_element() {
        let mut docs = vec![
            doc! { "i": 0, "tags": ["m", "z"] },
            doc! { "i": 1, "tags": ["b", "n"] },
        ];
        sort_documents(&mut docs, &[("tags".to_string(), SortDirection::Ascending)]);
        assert_eq!(docs[0].get_i32("i").unwrap(), 1);

        sort_documents(&mut docs, &[("tags".to_string(), SortDirection::Descending)]);
        assert_eq!(docs[0].get_i32("i").unwrap(), 0);
    }

    #[test]
    fn test_project_keeps_id() {
        let doc = doc! { "_id": 7, "name": "x", "author": "y", "price": 1.0, "tags": [] };
        let projected = project(&doc, &["name".to_string(), "price".to_string()]);
        let keys: Vec<&str> = projected.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_id", "name", "price"]);
    }

    #[test]
    fn test_project_empty_selection_keeps_all() {
        let doc = doc! { "_id": 7, "name": "x", "price": 1.0 };
        assert_eq!(project(&doc, &[]), doc);
    }

    #[test]
    fn test_apply_update_increment() {
        let mut doc = doc! { "price": 10.0, "count": 1, "name": "x" };
        let changed = apply_update(
            &mut doc,
            &Update::new().inc("price", 33).inc("count", 2).inc("seats", 5),
        )
        .unwrap();

        assert!(changed);
        assert_eq!(doc.get_f64("price").unwrap(), 43.0);
        assert_eq!(doc.get_i32("count").unwrap(), 3);
        assert_eq!(doc.get_i32("seats").unwrap(), 5);
        assert_eq!(doc.get_str("name").unwrap(), "x");
    }

    #[test]
    fn test_apply_update_non_numeric_leaves_document() {
        let mut doc = doc! { "price": 10.0, "name": "x" };
        let err = apply_update(&mut doc, &Update::new().inc("price", 1).inc("name", 1)).unwrap_err();

        assert!(matches!(err, SyllabusError::Storage(_)));
        assert_eq!(doc.get_f64("price").unwrap(), 10.0);
    }

    #[test]
    fn test_apply_update_reports_no_change() {
        let mut doc = doc! { "author": "Daniel", "price": 10.0 };
        assert!(!apply_update(&mut doc, &Update::new().set("author", "Daniel")).unwrap());
        assert!(!apply_update(&mut doc, &Update::new().unset("missing")).unwrap());
        assert!(!apply_update(&mut doc, &Update::new().inc("price", 0)).unwrap());
        assert!(apply_update(&mut doc, &Update::new().unset("author")).unwrap());
        assert!(!doc.contains_key("author"));
    }
}
