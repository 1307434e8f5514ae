use async_trait::async_trait;
use sqlx::PgPool;

use crate::metrics;
use crate::persistence::StoreError;

/// Slot counters credited by payment notifications.
#[async_trait]
pub trait SlotLedger: Send + Sync {
    /// Adds `quantity` slots to `user_id`, creating the counter if absent.
    async fn add_slots(&self, user_id: &str, quantity: i32) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgSlotLedger {
    pool: PgPool,
}

impl PgSlotLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotLedger for PgSlotLedger {
    async fn add_slots(&self, user_id: &str, quantity: i32) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let upsert = sqlx::query(
            "INSERT INTO resume_slots (user_id, max_slots) VALUES ($1, $2)
             ON CONFLICT (user_id)
             DO UPDATE SET max_slots = resume_slots.max_slots + EXCLUDED.max_slots,
                           updated_at = NOW()",
        )
        .bind(user_id)
        .bind(quantity)
        .execute(&mut *tx);
        metrics::sql("upsert", "resume_slots", upsert).await?;
        tx.commit().await?;
        Ok(())
    }
}
