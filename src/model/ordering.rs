//! Sibling ordering for modules within a course and lessons within a module.
//!
//! Indices are kept contiguous from zero. Every mutation runs inside a
//! transaction that first locks the parent row, so concurrent reorders of the
//! same parent serialize. The `(parent, order_index)` unique constraints are
//! deferred, which lets the shifts pass through intermediate duplicates.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::model::error::{DatabaseError, DatabaseResult};

#[derive(Debug, Clone, Copy)]
pub struct OrderedTable {
    table: &'static str,
    parent_table: &'static str,
    parent_column: &'static str,
}

pub const MODULES: OrderedTable = OrderedTable {
    table: "modules",
    parent_table: "courses",
    parent_column: "course_id",
};

pub const LESSONS: OrderedTable = OrderedTable {
    table: "lessons",
    parent_table: "modules",
    parent_column: "module_id",
};

/// Where an item should land given the current number of siblings.
pub fn clamp_index(requested: i32, siblings: i32) -> i32 {
    requested.clamp(0, siblings.max(0))
}

impl OrderedTable {
    pub async fn lock_parent(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
    ) -> DatabaseResult<()> {
        let locked: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE id = $1 FOR UPDATE",
            self.parent_table
        ))
        .bind(parent_id)
        .fetch_optional(&mut **tx)
        .await?;

        locked.map(|_| ()).ok_or(DatabaseError::NotFound)
    }

    pub async fn sibling_count(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
    ) -> DatabaseResult<i32> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            self.table, self.parent_column
        ))
        .bind(parent_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// Frees `requested` (clamped to `0..=siblings`) by shifting later siblings up.
    /// Returns the index the new item should take.
    pub async fn open_slot(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
        requested: Option<i32>,
    ) -> DatabaseResult<i32> {
        self.lock_parent(tx, parent_id).await?;
        let siblings = self.sibling_count(tx, parent_id).await?;

        let index = match requested {
            Some(requested) => clamp_index(requested, siblings),
            None => siblings,
        };

        if index < siblings {
            sqlx::query(&format!(
                "UPDATE {} SET order_index = order_index + 1 WHERE {} = $1 AND order_index >= $2",
                self.table, self.parent_column
            ))
            .bind(parent_id)
            .bind(index)
            .execute(&mut **tx)
            .await?;
        }

        Ok(index)
    }

    /// Closes the hole left by a removed item at `removed_index`.
    pub async fn close_gap(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
        removed_index: i32,
    ) -> DatabaseResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET order_index = order_index - 1 WHERE {} = $1 AND order_index > $2",
            self.table, self.parent_column
        ))
        .bind(parent_id)
        .bind(removed_index)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Moves `item_id` to `requested` and shifts the siblings in between.
    /// Returns the index the item ended up at.
    pub async fn move_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
        item_id: Uuid,
        requested: i32,
    ) -> DatabaseResult<i32> {
        self.lock_parent(tx, parent_id).await?;

        let current: Option<i32> = sqlx::query_scalar(&format!(
            "SELECT order_index FROM {} WHERE id = $1 AND {} = $2",
            self.table, self.parent_column
        ))
        .bind(item_id)
        .bind(parent_id)
        .fetch_optional(&mut **tx)
        .await?;
        let current = current.ok_or(DatabaseError::NotFound)?;

        let siblings = self.sibling_count(tx, parent_id).await?;
        let target = clamp_index(requested, siblings - 1);

        if target > current {
            sqlx::query(&format!(
                "UPDATE {} SET order_index = order_index - 1 WHERE {} = $1 AND order_index > $2 AND order_index <= $3",
                self.table, self.parent_column
            ))
            .bind(parent_id)
            .bind(current)
            .bind(target)
            .execute(&mut **tx)
            .await?;
        } else if target < current {
            sqlx::query(&format!(
                "UPDATE {} SET order_index = order_index + 1 WHERE {} = $1 AND order_index >= $2 AND order_index < $3",
                self.table, self.parent_column
            ))
            .bind(parent_id)
            .bind(target)
            .bind(current)
            .execute(&mut **tx)
            .await?;
        }

        sqlx::query(&format!(
            "UPDATE {} SET order_index = $2, updated_at = now() WHERE id = $1",
            self.table
        ))
        .bind(item_id)
        .bind(target)
        .execute(&mut **tx)
        .await?;

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_index_bounds() {
        assert_eq!(clamp_index(-3, 4), 0);
        assert_eq!(clamp_index(2, 4), 2);
        assert_eq!(clamp_index(10, 4), 4);
        assert_eq!(clamp_index(5, 0), 0);
        assert_eq!(clamp_index(1, -1), 0);
    }
}
