use crate::front::request::SenderId;
use std::collections::BTreeSet;

/// Senders that asked to hear when the node leaves the not-ready states.
#[derive(Debug, Default)]
pub struct ReadyWaiters {
    senders: BTreeSet<SenderId>,
}

impl ReadyWaiters {
    pub fn register(&mut self, sender: SenderId) -> bool {
        self.senders.insert(sender)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    pub fn drain(&mut self) -> Vec<SenderId> {
        std::mem::take(&mut self.senders).into_iter().collect()
    }
}
