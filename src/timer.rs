//! Ack-collection timeout and the sender's retry budget.
//!
//! After every transmit sweep the sender listens for acks, each receive
//! bounded by the ack timeout. A listening phase that ends without a single
//! datagram is a *silent round*. [`RetryBudget`] counts consecutive silent
//! rounds and declares the peer dead once the count exceeds its limit.
//!
//! The counter lives for the whole transfer, not one window: it is reset
//! only when an ack actually arrives. A slow but alive peer therefore never
//! trips the budget, while a vanished one is detected within
//! `(limit + 1) * ack_timeout` whatever window it vanished in.

/// Consecutive-timeout counter carried across windows.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    limit: u32,
    consecutive: u32,
}

impl RetryBudget {
    /// Budget allowing `limit` consecutive silent rounds.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            consecutive: 0,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Silent rounds since the last ack.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Any ack from the peer, current-window or not.
    pub fn on_ack(&mut self) {
        self.consecutive = 0;
    }

    /// A listening phase that heard nothing.
    pub fn on_silent_round(&mut self) {
        self.consecutive = self.consecutive.saturating_add(1);
    }

    /// `true` once the count has gone past the limit.
    pub fn is_exhausted(&self) -> bool {
        self.consecutive > self.limit
    }
}
