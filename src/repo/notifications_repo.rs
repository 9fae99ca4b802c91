use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Clone)]
pub struct NotificationsRepo {
    pub pool: PgPool,
}

impl NotificationsRepo {
    /// Records that a notification is about to go out. Returns false when
    /// the same (user, event, dedupe key, channel) was already recorded, in
    /// which case the caller must not send again.
    pub async fn record(
        &self,
        user_id: Uuid,
        event_type: &str,
        dedupe_key: &str,
        channel: &str,
        payload: Value,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, event_type, dedupe_key, channel, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, event_type, dedupe_key, channel) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_type)
        .bind(dedupe_key)
        .bind(channel)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
