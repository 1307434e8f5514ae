//! Idempotent consumer for payment notifications.
//!
//! Strict order: verify signature, skip unpaid orders, claim the per-order
//! idempotency key, credit slots, and release the key if crediting fails so
//! a redelivery can try again. A crash between claim and credit needs the key
//! to expire before the order can be applied.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use super::ledger::SlotLedger;
use super::sign;
use crate::tasks::kv::EphemeralStore;

const PAID: &str = "paid";

#[derive(Debug, Clone, Deserialize)]
pub struct PayNotification {
    pub order_id: String,
    #[serde(default)]
    pub out_trade_no: String,
    pub user_id: String,
    pub quantity: i32,
    pub status: String,
    #[serde(default)]
    pub paid_at: String,
    #[serde(default)]
    pub sign: String,
}

impl PayNotification {
    fn signed_fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("order_id", self.order_id.clone()),
            ("out_trade_no", self.out_trade_no.clone()),
            ("user_id", self.user_id.clone()),
            ("quantity", self.quantity.to_string()),
            ("status", self.status.clone()),
            ("paid_at", self.paid_at.clone()),
        ])
    }

    fn idempotency_key(&self) -> String {
        format!("slot:pay:notify:{}", self.order_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Accepted,
    AlreadyProcessed,
    NotPaid,
    /// Terminal: the notification is invalid and had no effect.
    Rejected(String),
    /// The effect could not be applied; a redelivery may succeed.
    Failed(String),
}

impl NotifyOutcome {
    /// Whether the notifier should consider this delivery done.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            NotifyOutcome::Accepted | NotifyOutcome::AlreadyProcessed | NotifyOutcome::NotPaid
        )
    }

    pub fn message(&self) -> String {
        match self {
            NotifyOutcome::Accepted => "success".to_string(),
            NotifyOutcome::AlreadyProcessed => "duplicate notify, already processed".to_string(),
            NotifyOutcome::NotPaid => "order not paid".to_string(),
            NotifyOutcome::Rejected(reason) | NotifyOutcome::Failed(reason) => reason.clone(),
        }
    }
}

pub struct NotificationGuard {
    kv: Arc<dyn EphemeralStore>,
    ledger: Arc<dyn SlotLedger>,
    secret: String,
    claim_ttl: Duration,
}

impl NotificationGuard {
    pub fn new(
        kv: Arc<dyn EphemeralStore>,
        ledger: Arc<dyn SlotLedger>,
        secret: String,
        claim_ttl: Duration,
    ) -> Self {
        Self {
            kv,
            ledger,
            secret,
            claim_ttl,
        }
    }

    pub async fn handle(&self, notification: &PayNotification) -> NotifyOutcome {
        let order_id = notification.order_id.as_str();

        if !sign::verify(&notification.signed_fields(), &self.secret, &notification.sign) {
            warn!(order_id, "Rejected payment notification: invalid signature");
            return NotifyOutcome::Rejected("invalid signature".into());
        }

        if notification.status != PAID {
            info!(order_id, status = %notification.status, "Order not paid, nothing to apply");
            return NotifyOutcome::NotPaid;
        }

        if notification.quantity <= 0 {
            warn!(order_id, quantity = notification.quantity, "Rejected payment notification: bad quantity");
            return NotifyOutcome::Rejected("invalid quantity".into());
        }

        let key = notification.idempotency_key();
        match self.kv.claim(&key, self.claim_ttl).await {
            Ok(true) => {}
            Ok(false) => {
                info!(order_id, "Duplicate payment notification ignored");
                return NotifyOutcome::AlreadyProcessed;
            }
            Err(e) => {
                error!(order_id, "Idempotency claim failed: {e}");
                return NotifyOutcome::Failed("idempotent check failed".into());
            }
        }

        if let Err(e) = self
            .ledger
            .add_slots(&notification.user_id, notification.quantity)
            .await
        {
            error!(order_id, "Adding slots failed, releasing claim: {e}");
            if let Err(release) = self.kv.release(&key).await {
                error!(order_id, "Failed to release idempotency claim: {release}");
            }
            return NotifyOutcome::Failed(format!("add slots failed: {e}"));
        }

        info!(
            order_id,
            user_id = %notification.user_id,
            quantity = notification.quantity,
            "Slot payment applied"
        );
        NotifyOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryKv, MemoryLedger};

    const SECRET: &str = "notify-secret";

    fn signed(order_id: &str, quantity: i32, status: &str) -> PayNotification {
        let mut n = PayNotification {
            order_id: order_id.into(),
            out_trade_no: format!("trade-{order_id}"),
            user_id: "1001".into(),
            quantity,
            status: status.into(),
            paid_at: "2025-11-27T17:00:00Z".into(),
            sign: String::new(),
        };
        n.sign = sign::generate(&n.signed_fields(), SECRET);
        n
    }

    fn guard(kv: &Arc<MemoryKv>, ledger: &Arc<MemoryLedger>) -> NotificationGuard {
        NotificationGuard::new(
            kv.clone(),
            ledger.clone(),
            SECRET.into(),
            Duration::from_secs(86_400),
        )
    }

    #[tokio::test]
    async fn test_paid_notification_credits_slots_once() {
        let kv = Arc::new(MemoryKv::default());
        let ledger = Arc::new(MemoryLedger::default());
        let guard = guard(&kv, &ledger);
        let n = signed("o1", 3, "paid");

        assert_eq!(guard.handle(&n).await, NotifyOutcome::Accepted);
        assert_eq!(guard.handle(&n).await, NotifyOutcome::AlreadyProcessed);
        assert_eq!(ledger.slots("1001"), 3);
        assert_eq!(
            kv.ttl_of("slot:pay:notify:o1"),
            Some(Duration::from_secs(86_400))
        );
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_apply_once() {
        let kv = Arc::new(MemoryKv::default());
        let ledger = Arc::new(MemoryLedger::default());
        let gate = ledger.hold();
        let guard = Arc::new(guard(&kv, &ledger));
        let n = signed("o2", 2, "paid");

        let first = tokio::spawn({
            let guard = guard.clone();
            let n = n.clone();
            async move { guard.handle(&n).await }
        });
        gate.entered().await;

        assert_eq!(guard.handle(&n).await, NotifyOutcome::AlreadyProcessed);
        gate.release();

        assert_eq!(first.await.unwrap(), NotifyOutcome::Accepted);
        assert_eq!(ledger.slots("1001"), 2);
        assert_eq!(ledger.calls(), 1);
    }

    #[tokio::test]
    async fn test_tampered_quantity_is_rejected_without_effect() {
        let kv = Arc::new(MemoryKv::default());
        let ledger = Arc::new(MemoryLedger::default());
        let mut n = signed("o3", 1, "paid");
        n.quantity = 50;

        let outcome = guard(&kv, &ledger).handle(&n).await;

        assert_eq!(outcome, NotifyOutcome::Rejected("invalid signature".into()));
        assert!(!outcome.is_success());
        assert_eq!(kv.len(), 0);
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn test_unpaid_order_is_acknowledged_without_effect() {
        let kv = Arc::new(MemoryKv::default());
        let ledger = Arc::new(MemoryLedger::default());

        let outcome = guard(&kv, &ledger).handle(&signed("o4", 1, "pending")).await;

        assert_eq!(outcome, NotifyOutcome::NotPaid);
        assert!(outcome.is_success());
        assert_eq!(kv.len(), 0);
    }

    #[tokio::test]
    async fn test_failed_credit_releases_claim_for_retry() {
        let kv = Arc::new(MemoryKv::default());
        let ledger = Arc::new(MemoryLedger::default());
        let guard = guard(&kv, &ledger);
        let n = signed("o5", 4, "paid");

        ledger.fail_next();
        assert!(matches!(guard.handle(&n).await, NotifyOutcome::Failed(_)));
        assert_eq!(kv.len(), 0);

        assert_eq!(guard.handle(&n).await, NotifyOutcome::Accepted);
        assert_eq!(ledger.slots("1001"), 4);
    }

    #[tokio::test]
    async fn test_claim_failure_is_reported_without_effect() {
        let kv = Arc::new(MemoryKv::default());
        let ledger = Arc::new(MemoryLedger::default());
        kv.fail_all();

        let outcome = guard(&kv, &ledger).handle(&signed("o6", 1, "paid")).await;

        assert_eq!(outcome, NotifyOutcome::Failed("idempotent check failed".into()));
        assert_eq!(ledger.calls(), 0);
    }
}
