use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::ordering::MODULES;
use crate::model::{
    ModelManager,
    error::{DatabaseError, DatabaseResult},
    repo::CrudRepository,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Module {
    id: Uuid,
    course_id: Uuid,
    title: String,
    description: String,
    order_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    instructor_id: Uuid,
    course_title: String,
}

#[derive(Debug)]
pub struct ModuleCreate {
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub order_index: Option<i32>,
}

#[derive(Debug, Default)]
pub struct ModuleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Module {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }
}

impl HasOwner for Module {
    fn owner_id(&self) -> Uuid {
        self.instructor_id
    }
}

static SELECT_MODULE: &str = r#"
    SELECT m.*, c.instructor_id, c.title AS course_title
    FROM modules m
    JOIN courses c ON c.id = m.course_id
"#;

#[async_trait]
impl CrudRepository for Module {
    type Id = Uuid;
    type Create = ModuleCreate;
    type Update = ModuleUpdate;

    async fn create(mm: &ModelManager, data: ModuleCreate) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;
        let index = MODULES.open_slot(&mut tx, data.course_id, data.order_index).await?;

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO modules (id, course_id, title, description, order_index) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(data.course_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(index)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let module = sqlx::query_as(&format!("{SELECT_MODULE} WHERE m.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(module)
    }

    async fn update(mm: &ModelManager, id: Uuid, data: ModuleUpdate) -> DatabaseResult<Option<Self>> {
        let updated = sqlx::query(
            r#"
            UPDATE modules SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .execute(mm.executor())
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(mm, id).await
    }

    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let Some(module) = Self::find_by_id(mm, id).await? else {
            return Ok(None);
        };

        let mut tx = mm.executor().begin().await?;
        MODULES.lock_parent(&mut tx, module.course_id).await?;
        let removed: Option<i32> =
            sqlx::query_scalar("DELETE FROM modules WHERE id = $1 RETURNING order_index")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(removed) = removed else {
            return Ok(None);
        };
        MODULES.close_gap(&mut tx, module.course_id, removed).await?;
        tx.commit().await?;

        Ok(Some(module))
    }
}

impl Module {
    pub async fn by_course(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let modules = sqlx::query_as(&format!(
            "{SELECT_MODULE} WHERE m.course_id = $1 ORDER BY m.order_index"
        ))
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(modules)
    }

    pub async fn reorder(mm: &ModelManager, id: Uuid, new_index: i32) -> DatabaseResult<Self> {
        let module = Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)?;

        let mut tx = mm.executor().begin().await?;
        MODULES.move_item(&mut tx, module.course_id, id, new_index).await?;
        tx.commit().await?;

        Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)
    }
}
