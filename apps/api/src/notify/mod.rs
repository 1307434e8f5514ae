pub mod guard;
pub mod handlers;
pub mod ledger;
pub mod sign;

pub use guard::{NotificationGuard, NotifyOutcome, PayNotification};
pub use ledger::{PgSlotLedger, SlotLedger};
