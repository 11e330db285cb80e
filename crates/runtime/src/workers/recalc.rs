//! Depth-one recalculation queue.

/// Why a recalculation was requested, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalcRequest {
    pub reason: &'static str,
}

/// Holds at most one pending recalculation; a newer request replaces an
/// older one.
///
/// The worker drains commands before it runs the pending request, so a
/// burst of passings ends in one recalculation that sees every mutation.
#[derive(Debug, Default)]
pub struct RecalcQueue {
    pending: Option<RecalcRequest>,
    coalesced: u64,
}

impl RecalcQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, reason: &'static str) {
        if self.pending.replace(RecalcRequest { reason }).is_some() {
            self.coalesced += 1;
        }
    }

    pub fn take(&mut self) -> Option<RecalcRequest> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the pending request, e.g. after an explicit recalculation.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Requests superseded before they ran.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_request_wins() {
        let mut queue = RecalcQueue::new();
        assert!(queue.take().is_none());

        queue.request("passing");
        queue.request("passing");
        queue.request("places");

        assert_eq!(queue.coalesced(), 2);
        assert_eq!(queue.take(), Some(RecalcRequest { reason: "places" }));
        assert!(!queue.is_pending());
    }

    #[test]
    fn clear_discards_pending() {
        let mut queue = RecalcQueue::new();
        queue.request("tick");
        queue.clear();
        assert!(queue.take().is_none());
    }
}
