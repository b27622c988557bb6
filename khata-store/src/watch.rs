use khata_core::{CounterpartyAccount, CounterpartyId, OwnerId};
use tokio::sync::broadcast;

/// Number of changes buffered per subscriber before slow ones start lagging.
pub(crate) const FEED_CAPACITY: usize = 64;

/// Change notification emitted after a successful store write.
#[derive(Clone, Debug)]
pub enum AccountChange {
    Saved {
        owner: OwnerId,
        account: CounterpartyAccount,
    },
    Deleted {
        owner: OwnerId,
        counterparty: CounterpartyId,
    },
}

impl AccountChange {
    pub fn owner(&self) -> &OwnerId {
        match self {
            AccountChange::Saved { owner, .. } => owner,
            AccountChange::Deleted { owner, .. } => owner,
        }
    }
}

/// Fan-out feed of account changes backed by a broadcast channel.
#[derive(Debug)]
pub struct AccountFeed {
    sender: broadcast::Sender<AccountChange>,
}

impl AccountFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> AccountWatcher {
        AccountWatcher {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish a change; dropped silently when nobody is listening.
    pub fn publish(&self, change: AccountChange) {
        let _ = self.sender.send(change);
    }
}

impl Default for AccountFeed {
    fn default() -> Self {
        Self::new(FEED_CAPACITY)
    }
}

/// Receiving half of an [`AccountFeed`] subscription.
pub struct AccountWatcher {
    receiver: broadcast::Receiver<AccountChange>,
}

impl AccountWatcher {
    /// Wait for the next change. A subscriber that falls behind the feed
    /// capacity observes a `Lagged` error and resumes at the oldest retained
    /// change.
    pub async fn recv(&mut self) -> Result<AccountChange, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Poll for a change without waiting.
    pub fn try_recv(&mut self) -> Result<AccountChange, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }
}
