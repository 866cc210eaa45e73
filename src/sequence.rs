//! Request sequencing
//!
//! Overlapping requests for the same group (or the same downstream select)
//! each take a ticket; only the holder of the latest ticket may apply its
//! response.

use crate::model::GroupId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// What a ticket is issued for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// Saving a group
    Autosave(GroupId),
    /// Loading one downstream select of a group
    Options {
        /// Group holding the select
        group: GroupId,
        /// Logical name of the select
        downstream: String,
    },
}

/// Proof of issue order for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    key: RequestKey,
    seq: u64,
}

impl Ticket {
    /// Position in issue order, starting at 1
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Per-key monotonic counters
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: Mutex<HashMap<RequestKey, u64>>,
}

impl RequestSequencer {
    /// Sequencer with no tickets issued
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next ticket for `key`, superseding earlier ones
    pub fn issue(&self, key: RequestKey) -> Ticket {
        let mut latest = self.latest.lock();
        let seq = latest.entry(key.clone()).or_insert(0);
        *seq += 1;
        Ticket { key, seq: *seq }
    }

    /// Whether no later ticket has been issued for the same key
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest.lock().get(&ticket.key).copied() == Some(ticket.seq)
    }
}
