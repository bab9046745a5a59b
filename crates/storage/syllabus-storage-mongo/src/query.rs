//! Translation of typed expressions into MongoDB query documents

use mongodb::bson::{doc, Bson, Document};
use mongodb::options::FindOptions;
use syllabus_core::{Filter, QueryOptions, Update, UpdateOp};

/// Build the query document for a filter
pub fn filter_document(filter: &Filter) -> Document {
    match filter {
        Filter::All => Document::new(),
        Filter::Equals(field, value) => field_clause(field, doc! { "$eq": value.clone() }),
        Filter::MatchesPattern {
            field,
            pattern,
            case_insensitive,
        } => {
            let mut clause = doc! { "$regex": pattern.as_str() };
            if *case_insensitive {
                clause.insert("$options", "i");
            }
            field_clause(field, clause)
        }
        Filter::Or(filters) => doc! { "$or": filter_array(filters) },
        // `$and` rejects an empty array; an empty conjunction matches everything.
        Filter::And(filters) if filters.is_empty() => Document::new(),
        Filter::And(filters) => doc! { "$and": filter_array(filters) },
    }
}

fn field_clause(field: &str, clause: Document) -> Document {
    let mut out = Document::new();
    out.insert(field, clause);
    out
}

fn filter_array(filters: &[Filter]) -> Vec<Bson> {
    filters
        .iter()
        .map(|f| Bson::Document(filter_document(f)))
        .collect()
}

/// Build the update document (`$inc`, `$set`, `$unset`)
pub fn update_document(update: &Update) -> Document {
    let mut inc = Document::new();
    let mut set = Document::new();
    let mut unset = Document::new();

    for op in &update.ops {
        match op {
            UpdateOp::Increment(field, by) => {
                inc.insert(field.clone(), by.clone());
            }
            UpdateOp::Set(field, value) => {
                set.insert(field.clone(), value.clone());
            }
            UpdateOp::Unset(field) => {
                unset.insert(field.clone(), "");
            }
        }
    }

    let mut out = Document::new();
    if !inc.is_empty() {
        out.insert("$inc", inc);
    }
    if !set.is_empty() {
        out.insert("$set", set);
    }
    if !unset.is_empty() {
        out.insert("$unset", unset);
    }
    out
}

/// Driver find options for projection, sort and paging
pub fn find_options(options: &QueryOptions) -> FindOptions {
    let mut find = FindOptions::default();

    if let Some(fields) = &options.projection {
        let mut projection = Document::new();
        for field in fields {
            projection.insert(field.clone(), 1);
        }
        find.projection = Some(projection);
    }

    if !options.sort.is_empty() {
        let mut sort = Document::new();
        for (field, direction) in &options.sort {
            sort.insert(field.clone(), direction.as_i32());
        }
        find.sort = Some(sort);
    }

    find.limit = options
        .limit
        .filter(|limit| *limit > 0)
        .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
    find.skip = options.skip;
    find
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use syllabus_core::SortDirection;

    #[test]
    fn test_backend_course_query() {
        let filter = Filter::pattern_ci("tags", "backend").and(Filter::eq("isPublished", true));
        assert_eq!(
            filter_document(&filter),
            doc! {
                "$and": [
                    { "tags": { "$regex": "backend", "$options": "i" } },
                    { "isPublished": { "$eq": true } },
                ]
            }
        );
    }

    #[test]
    fn test_or_and_id_filters() {
        let id = ObjectId::new();
        let filter = Filter::or([Filter::id(id), Filter::pattern("name", "^React")]);
        assert_eq!(
            filter_document(&filter),
            doc! {
                "$or": [
                    { "_id": { "$eq": id } },
                    { "name": { "$regex": "^React" } },
                ]
            }
        );
    }

    #[test]
    fn test_empty_filters() {
        assert_eq!(filter_document(&Filter::all()), doc! {});
        assert_eq!(filter_document(&Filter::And(vec![])), doc! {});
    }

    #[test]
    fn test_update_document_groups_operators() {
        let update = Update::new()
            .inc("price", 33)
            .set("author", "Someone Else")
            .set("isPublished", true)
            .unset("tags");
        assert_eq!(
            update_document(&update),
            doc! {
                "$inc": { "price": 33 },
                "$set": { "author": "Someone Else", "isPublished": true },
                "$unset": { "tags": "" },
            }
        );
    }

    #[test]
    fn test_find_options() {
        let options = QueryOptions::new()
            .select(["name", "author", "price"])
            .sort_by("name", SortDirection::Ascending)
            .sort_by("price", SortDirection::Descending)
            .limit(10)
            .skip(5);
        let find = find_options(&options);

        assert_eq!(find.projection, Some(doc! { "name": 1, "author": 1, "price": 1 }));
        assert_eq!(find.sort, Some(doc! { "name": 1, "price": -1 }));
        assert_eq!(find.limit, Some(10));
        assert_eq!(find.skip, Some(5));
    }

    #[test]
    fn test_find_options_defaults() {
        let find = find_options(&QueryOptions::new().limit(0));
        assert!(find.projection.is_none());
        assert!(find.sort.is_none());
        assert!(find.limit.is_none());
    }
}
