mod access;
pub use access::{Access, HasOwner, Relation, authorize, check_access};

mod database;
pub use database::DbConnection;

pub mod entity;

mod error;
pub use error::{DatabaseError, DatabaseResult};

pub mod grading;
pub(crate) mod ordering;
pub mod progress;

mod repo;
pub use repo::{CrudRepository, Page, ResourceType, ResourceTyped};

use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct ModelManager {
    database: DbConnection,
}

impl ModelManager {
    pub fn new(conn: DbConnection) -> Self {
        Self { database: conn }
    }

    pub fn executor(&self) -> &PgPool {
        self.database.pool()
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}
