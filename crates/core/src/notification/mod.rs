//! Member notifications.
//!
//! Operations produce [`NotificationDraft`]s; the database layer stores them
//! in an outbox and a dispatcher delivers them later.

pub mod templates;
pub mod types;

pub use templates::NotificationTemplates;
pub use types::{
    DeliveryPolicy, NotificationChannel, NotificationDraft, NotificationKind, NotificationPriority,
};
