use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use shared::domain::{AccountAddress, EntityKind, ObjectId};

/// Durable per-account object-reference store.
///
/// References are keyed by (entity kind, account address) so one account's
/// pizza box can never shadow another account's, and a flag reference can
/// never collide with a box reference.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredObjectRef {
    pub kind: EntityKind,
    pub account: AccountAddress,
    pub object_id: ObjectId,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        let storage = Self { pool };
        storage.ensure_object_refs_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_object_refs_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS object_refs (
                entity_kind     TEXT NOT NULL,
                account_address TEXT NOT NULL,
                object_id       TEXT NOT NULL,
                updated_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (entity_kind, account_address)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure object_refs table exists")?;
        Ok(())
    }

    /// Last write wins for the (kind, account) slot.
    pub async fn save_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
        object_id: &ObjectId,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO object_refs (entity_kind, account_address, object_id, updated_at)
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(entity_kind, account_address) DO UPDATE SET
                object_id = excluded.object_id,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(kind.as_str())
        .bind(account.as_str())
        .bind(object_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
    ) -> Result<Option<StoredObjectRef>> {
        let row = sqlx::query(
            "SELECT object_id, updated_at FROM object_refs
             WHERE entity_kind = ? AND account_address = ?",
        )
        .bind(kind.as_str())
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StoredObjectRef {
            kind,
            account: account.clone(),
            object_id: ObjectId(r.get::<String, _>(0)),
            updated_at: r.get::<DateTime<Utc>, _>(1),
        }))
    }

    pub async fn list_refs_for_account(
        &self,
        account: &AccountAddress,
    ) -> Result<Vec<StoredObjectRef>> {
        let rows = sqlx::query(
            "SELECT entity_kind, object_id, updated_at FROM object_refs
             WHERE account_address = ?
             ORDER BY entity_kind ASC",
        )
        .bind(account.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let kind = EntityKind::parse(&r.get::<String, _>(0))?;
                Some(StoredObjectRef {
                    kind,
                    account: account.clone(),
                    object_id: ObjectId(r.get::<String, _>(1)),
                    updated_at: r.get::<DateTime<Utc>, _>(2),
                })
            })
            .collect())
    }

    pub async fn clear_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM object_refs WHERE entity_kind = ? AND account_address = ?",
        )
        .bind(kind.as_str())
        .bind(account.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every stored reference for one account. Other accounts'
    /// references are untouched.
    pub async fn clear_account_refs(&self, account: &AccountAddress) -> Result<u64> {
        let result = sqlx::query("DELETE FROM object_refs WHERE account_address = ?")
            .bind(account.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
