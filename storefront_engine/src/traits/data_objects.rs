use chrono::{DateTime, Utc};

use crate::db_types::{LinkStatus, Order};

/// Result of the conditional order insert. `AlreadyExists` means another trigger (webhook, manual verify, sweep)
/// derived the order first and carries what that trigger wrote.
#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Order),
    AlreadyExists(Order),
}

impl InsertOrderResult {
    pub fn order(&self) -> &Order {
        match self {
            InsertOrderResult::Inserted(o) | InsertOrderResult::AlreadyExists(o) => o,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOrderResult::Inserted(_))
    }
}

/// Filter for the admin payment-link listing.
#[derive(Debug, Clone, Default)]
pub struct LinkQueryFilter {
    pub status: Option<LinkStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl LinkQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.since.is_none() && self.until.is_none()
    }

    pub fn with_status(status: LinkStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }
}
