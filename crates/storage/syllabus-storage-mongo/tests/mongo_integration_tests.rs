//! MongoDB integration tests
//!
//! These tests require a running MongoDB instance.
//! Set MONGODB_URL environment variable to run these tests.
//!
//! Run with: cargo test -p syllabus-storage-mongo --test mongo_integration_tests -- --ignored

use std::sync::Arc;
use syllabus_core::*;
use syllabus_storage_mongo::MongoStore;

async fn setup_session() -> Option<(Session, Arc<MongoStore>)> {
    let mongodb_url = std::env::var("MONGODB_URL").ok()?;
    let db_name = format!(
        "syllabus_test_{}",
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    );
    let base = mongodb_url.trim_end_matches('/');
    let endpoint = Endpoint::parse(&format!("{}/{}", base, db_name)).ok()?;

    match MongoStore::connect(&endpoint, &ConnectOptions::default()).await {
        Ok(store) => {
            let store = Arc::new(store);
            Some((Session::new(store.clone(), endpoint), store))
        }
        Err(_) => None,
    }
}

async fn teardown(session: Session, store: Arc<MongoStore>) {
    let _ = store.database().drop().await;
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires MongoDB instance"]
async fn test_course_create_and_find() {
    let Some((session, store)) = setup_session().await else {
        eprintln!("Skipping test - MongoDB not available");
        return;
    };
    let courses = CourseRepository::new(session.clone());

    // Create
    let created = courses
        .create(
            NewCourse::named("React Course")
                .author("Jane Doe")
                .tags(["react", "frontend"])
                .published(true)
                .price(15.0),
        )
        .await
        .unwrap();
    assert_eq!(created.version, 0);

    // Read
    let retrieved = courses.find_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(retrieved.name, "React Course");
    assert_eq!(retrieved.tags, vec!["react", "frontend"]);

    // Query by tag pattern with projection
    let found = courses
        .find_many(
            &Filter::pattern_ci("tags", "FRONT").and(Filter::eq("isPublished", true)),
            &QueryOptions::new().select(["name", "author"]),
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name.as_deref(), Some("React Course"));
    assert!(found[0].price.is_none());

    teardown(session, store).await;
}

#[tokio::test]
#[ignore = "Requires MongoDB instance"]
async fn test_course_update_paths() {
    let Some((session, store)) = setup_session().await else {
        eprintln!("Skipping test - MongoDB not available");
        return;
    };
    let courses = CourseRepository::new(session.clone());

    let mut course = courses
        .create(NewCourse::named("Node Backend").tags(["backend"]).price(10.0))
        .await
        .unwrap();
    let stale = course.clone();

    // Loaded update bumps the version
    courses
        .update_loaded(&mut course, bson::doc! { "author": "Someone Else" })
        .await
        .unwrap();
    assert_eq!(course.version, 1);

    // Stale copy conflicts
    let mut stale = stale;
    let result = courses
        .update_loaded(&mut stale, bson::doc! { "author": "Lost Write" })
        .await;
    assert!(matches!(result, Err(SyllabusError::Conflict { .. })));

    // Query update increments price only
    let summary = courses
        .update_by_query(
            &Filter::id(course.id),
            &Update::new().inc("price", 33),
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(summary.matched, 1);

    let reloaded = courses.find_by_id(&course.id).await.unwrap().unwrap();
    assert_eq!(reloaded.price, Some(43.0));
    assert_eq!(reloaded.author.as_deref(), Some("Someone Else"));
    assert_eq!(courses.count(&Filter::all()).await.unwrap(), 1);

    teardown(session, store).await;
}

#[tokio::test]
#[ignore = "Requires MongoDB instance"]
async fn test_closed_store_rejects_operations() {
    let Some((session, store)) = setup_session().await else {
        eprintln!("Skipping test - MongoDB not available");
        return;
    };
    assert!(session.is_ready().await.unwrap());

    let _ = store.database().drop().await;
    session.close().await.unwrap();

    assert!(!store.is_ready().await.unwrap());
    let result = store.count("courses", &Filter::all()).await;
    assert!(matches!(result, Err(SyllabusError::Connection(_))));
}
