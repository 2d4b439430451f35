use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::ProfileStore;
use crate::errors::AppResult;

/// `profiles` lookups backed by the shared SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn select_role(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let role = sqlx::query_scalar::<_, Option<String>>("SELECT role FROM profiles WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(role.flatten())
    }
}
