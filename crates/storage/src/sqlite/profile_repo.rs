use chrono::Utc;
use quiz_core::model::{Profile, UserId};
use sqlx::{QueryBuilder, Sqlite};

use super::SqliteRepository;
use super::mapping::{conn, map_profile_row};
use crate::repository::{ProfileRepository, StorageError};

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, display_name, avatar_url
                FROM profiles
                WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_profile_row).transpose()
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO profiles (user_id, display_name, avatar_url, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    avatar_url = excluded.avatar_url,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(profile.user_id().to_string())
        .bind(profile.display_name())
        .bind(profile.avatar_url())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn list_profiles(&self, user_ids: &[UserId]) -> Result<Vec<Profile>, StorageError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT user_id, display_name, avatar_url FROM profiles WHERE user_id IN (",
        );
        let mut ids = qb.separated(", ");
        for id in user_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_profile_row).collect()
    }
}
