//! Course repository
//!
//! Typed create/find/update operations against the Course collection. The
//! repository holds no records between calls; the store owns them.

use crate::session::Session;
use crate::types::{
    Course, CourseId, CourseView, Filter, QueryOptions, Schema, Update, UpdateOptions,
    UpdateSummary, COURSE_SCHEMA, ID_KEY, VERSION_KEY,
};
use crate::{Result, SyllabusError};
use bson::{Bson, Document};
use tracing::{debug, info, warn};

/// Repository over the `courses` collection
#[derive(Debug, Clone)]
pub struct CourseRepository {
    session: Session,
    schema: &'static Schema,
}

impl CourseRepository {
    /// Create a repository bound to an open session
    pub fn new(session: Session) -> Self {
        Self {
            session,
            schema: &COURSE_SCHEMA,
        }
    }

    /// Session this repository uses
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Schema records are validated against
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    fn collection(&self) -> &'static str {
        self.schema.collection
    }

    /// Validate, default and persist a new course
    pub async fn create(&self, fields: impl Into<Document>) -> Result<Course> {
        let store = self.session.store()?;
        let mut doc = self.schema.prepare_new(fields.into())?;

        let id = store.insert_one(self.collection(), doc.clone()).await?;
        doc.insert(ID_KEY, id);

        let course = Course::from_document(doc)?;
        info!("Created course {} ({})", course.id, course.name);
        Ok(course)
    }

    /// Find courses matching `filter`
    ///
    /// Returns every match at once. Projected fields come back as `None` in
    /// the views.
    pub async fn find_many(&self, filter: &Filter, options: &QueryOptions) -> Result<Vec<CourseView>> {
        let store = self.session.store()?;
        debug!("Finding courses where {}", filter);

        let docs = store.find(self.collection(), filter, options).await?;
        let courses = docs
            .into_iter()
            .map(CourseView::from_document)
            .collect::<Result<Vec<_>>>()?;

        debug!("Found {} courses", courses.len());
        Ok(courses)
    }

    /// Load one course; a missing id is `Ok(None)`
    pub async fn find_by_id(&self, id: &CourseId) -> Result<Option<Course>> {
        let store = self.session.store()?;
        let doc = store.find_one(self.collection(), &Filter::id(*id)).await?;
        doc.map(Course::from_document).transpose()
    }

    /// Count courses matching `filter`
    pub async fn count(&self, filter: &Filter) -> Result<u64> {
        self.session.store()?.count(self.collection(), filter).await
    }

    /// Merge `patch` onto a loaded course and save it
    ///
    /// The save only lands if the stored version still equals the loaded one;
    /// otherwise it fails with a conflict and the stored record is untouched.
    /// On success `course` reflects what was stored, including the bumped
    /// version.
    pub async fn update_loaded(&self, course: &mut Course, patch: impl Into<Document>) -> Result<()> {
        let store = self.session.store()?;
        let patch = patch.into();

        let mut doc = course.to_document()?;
        for (key, value) in patch {
            if key == ID_KEY || key == VERSION_KEY {
                return Err(SyllabusError::validation(
                    key,
                    "System fields cannot be patched",
                ));
            }
            if value == Bson::Null {
                self.schema.check_removable(&key)?;
                doc.remove(&key);
            } else {
                doc.insert(key, value);
            }
        }

        let expected_version = course.version;
        let mut doc = self.schema.validate(doc)?;
        doc.insert(VERSION_KEY, expected_version + 1);
        let saved = Course::from_document(doc.clone())?;

        let filter = Filter::id(course.id).and(Filter::eq(VERSION_KEY, expected_version));
        let summary = store.replace_one(self.collection(), &filter, doc).await?;

        if summary.matched == 0 {
            let exists = store
                .find_one(self.collection(), &Filter::id(course.id))
                .await?
                .is_some();
            if exists {
                warn!(
                    "Course {} changed since it was loaded at version {}",
                    course.id, expected_version
                );
                return Err(SyllabusError::conflict(course.id.to_hex(), expected_version));
            }
            return Err(SyllabusError::storage(format!(
                "No course found with id {}",
                course.id
            )));
        }

        *course = saved;
        info!("Saved course {} at version {}", course.id, course.version);
        Ok(())
    }

    /// Apply a partial update in the store to every matching course
    ///
    /// Schema checks run unless `options.skip_validation` is set.
    pub async fn update_by_query(
        &self,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> Result<UpdateSummary> {
        let store = self.session.store()?;

        let summary = if options.skip_validation {
            warn!("Updating courses where {} without schema validation", filter);
            store.update_many(self.collection(), filter, update).await?
        } else {
            let checked = self.schema.check_update(update)?;
            store.update_many(self.collection(), filter, &checked).await?
        };

        info!(
            "Updated courses where {}: matched {}, modified {}",
            filter, summary.matched, summary.modified
        );
        Ok(summary)
    }
}
