//! The payment-link state machine.
//!
//! Every legal transition for a [`LinkStatus`] lives here as a pure function over (current status, event). The
//! reconciliation API executes whatever effects come back; nothing else in the system decides what a gateway report
//! means for a stored link.
//!
//! | From \ Event | GatewaySucceeded      | GatewayFailed | GatewayPending | SessionExpired |
//! |--------------|-----------------------|---------------|----------------|----------------|
//! | Pending      | Completed, pay+derive | Failed        | no-op          | Expired        |
//! | Completed    | no move, derive       | no-op         | no-op          | no-op          |
//! | Failed       | Completed, pay+derive | no-op         | no-op          | no-op          |
//! | Expired      | Completed, pay+derive | no-op         | no-op          | no-op          |
//!
//! A completed link is never downgraded, and a success report always wins: if the gateway says the money moved, the
//! link completes even if a sweep had already written it off as failed or expired. Re-verifying a completed link
//! re-runs the (idempotent) order derivation but does not touch `paid_at` again.

use crate::db_types::{LinkStatus, OrderStatusType};

/// What a verification trigger learned about the link's gateway transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The gateway confirmed the charge.
    GatewaySucceeded,
    /// The gateway reported the charge as failed or abandoned.
    GatewayFailed,
    /// The gateway session is still open.
    GatewayPending,
    /// The link outlived its expiry window. Raised by the sweep, never by the gateway.
    SessionExpired,
}

/// Side effects the caller must execute, in order, after persisting the status move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEffect {
    /// Persist `Completed` with `paid_at`/`verified_at` stamped now.
    MarkPaid,
    /// Run the idempotent order derivation for this link.
    DeriveOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: LinkStatus,
    pub effects: Vec<LinkEffect>,
}

impl Transition {
    fn stay(status: LinkStatus) -> Self {
        Self { next: status, effects: Vec::new() }
    }

    pub fn is_noop(&self, current: LinkStatus) -> bool {
        self.next == current && self.effects.is_empty()
    }
}

/// Resolves the transition for `event` on a link currently in `status`. Total: every combination yields a
/// transition, and combinations with nothing to do come back as no-ops rather than errors, because verification
/// triggers overlap routinely (webhook, manual verify and sweep can all race on one reference).
pub fn apply(status: LinkStatus, event: LinkEvent) -> Transition {
    use LinkEffect::*;
    use LinkEvent::*;
    use LinkStatus::*;
    match (status, event) {
        (Completed, GatewaySucceeded) => Transition { next: Completed, effects: vec![DeriveOrder] },
        (_, GatewaySucceeded) => Transition { next: Completed, effects: vec![MarkPaid, DeriveOrder] },
        (Pending, GatewayFailed) => Transition { next: Failed, effects: Vec::new() },
        (Pending, SessionExpired) => Transition { next: Expired, effects: Vec::new() },
        (current, _) => Transition::stay(current),
    }
}

/// Guard for the order axis: cancellation is allowed from any non-terminal fulfillment state.
pub fn order_cancellable(status: OrderStatusType) -> bool {
    !matches!(status, OrderStatusType::Completed | OrderStatusType::Cancelled)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{LinkStatus, OrderStatusType};

    #[test]
    fn pending_completes_on_success() {
        let t = apply(LinkStatus::Pending, LinkEvent::GatewaySucceeded);
        assert_eq!(t.next, LinkStatus::Completed);
        assert_eq!(t.effects, vec![LinkEffect::MarkPaid, LinkEffect::DeriveOrder]);
    }

    #[test]
    fn pending_fails_on_failure() {
        let t = apply(LinkStatus::Pending, LinkEvent::GatewayFailed);
        assert_eq!(t.next, LinkStatus::Failed);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn pending_report_does_not_move_a_pending_link() {
        let t = apply(LinkStatus::Pending, LinkEvent::GatewayPending);
        assert!(t.is_noop(LinkStatus::Pending));
    }

    #[test]
    fn completed_is_never_downgraded() {
        for event in [LinkEvent::GatewayFailed, LinkEvent::GatewayPending, LinkEvent::SessionExpired] {
            let t = apply(LinkStatus::Completed, event);
            assert!(t.is_noop(LinkStatus::Completed), "{event:?} must not move a completed link");
        }
    }

    #[test]
    fn reverifying_a_completed_link_rederives_without_marking_paid() {
        let t = apply(LinkStatus::Completed, LinkEvent::GatewaySucceeded);
        assert_eq!(t.next, LinkStatus::Completed);
        assert_eq!(t.effects, vec![LinkEffect::DeriveOrder]);
    }

    #[test]
    fn a_late_success_wins_over_failed_and_expired() {
        for status in [LinkStatus::Failed, LinkStatus::Expired] {
            let t = apply(status, LinkEvent::GatewaySucceeded);
            assert_eq!(t.next, LinkStatus::Completed);
            assert_eq!(t.effects, vec![LinkEffect::MarkPaid, LinkEffect::DeriveOrder]);
        }
    }

    #[test]
    fn only_pending_links_expire() {
        let t = apply(LinkStatus::Pending, LinkEvent::SessionExpired);
        assert_eq!(t.next, LinkStatus::Expired);
        for status in [LinkStatus::Failed, LinkStatus::Expired] {
            assert!(apply(status, LinkEvent::SessionExpired).is_noop(status));
        }
    }

    #[test]
    fn cancellation_guard() {
        assert!(order_cancellable(OrderStatusType::Pending));
        assert!(order_cancellable(OrderStatusType::Processing));
        assert!(!order_cancellable(OrderStatusType::Completed));
        assert!(!order_cancellable(OrderStatusType::Cancelled));
    }
}
