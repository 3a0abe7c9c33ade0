use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Named high-water mark persisted in `relay_cursors`.
pub struct RelayCursor;

impl RelayCursor {
    pub async fn load(name: &str, pool: &PgPool) -> Result<Option<DateTime<Utc>>> {
        let mark = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT high_water_mark FROM relay_cursors WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(mark.flatten())
    }

    /// Upsert the mark. An older value never overwrites a newer one.
    pub async fn save(name: &str, high_water_mark: DateTime<Utc>, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "INSERT INTO relay_cursors (name, high_water_mark, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (name) DO UPDATE
             SET high_water_mark = GREATEST(relay_cursors.high_water_mark, EXCLUDED.high_water_mark),
                 updated_at = NOW()",
        )
        .bind(name)
        .bind(high_water_mark)
        .execute(pool)
        .await?;

        Ok(())
    }
}
