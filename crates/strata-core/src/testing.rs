use std::sync::Arc;

use strata_db::{Database, InMemoryDatabase, Project};

/// A fresh, open project in an in-memory database.
pub(crate) async fn project() -> Arc<dyn Project> {
    let db = InMemoryDatabase::default();
    db.open().await.expect("open database");
    db.open_project("test").await.expect("open project")
}
