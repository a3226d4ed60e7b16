use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::connection::ConnectionId;

pub type FileId = u64;

pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub sender: ConnectionId,
    pub recipient: ConnectionId,
    pub requested_at: Instant,
}

/// `ASK_FILE` handshakes waiting for their `REPLY_FILE`.
#[derive(Debug)]
pub struct FileRequests {
    counter: Mutex<FileId>,
    pending: HashMap<FileId, PendingFile>,
    ttl: Duration,
}

impl FileRequests {
    pub fn new(ttl: Duration) -> Self {
        FileRequests {
            counter: Mutex::new(0),
            pending: HashMap::new(),
            ttl,
        }
    }

    pub fn generate_id(&self) -> FileId {
        let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        *counter += 1;
        *counter
    }

    pub fn register(
        &mut self,
        sender: ConnectionId,
        recipient: ConnectionId,
        now: Instant,
    ) -> FileId {
        let id = self.generate_id();
        self.pending.insert(
            id,
            PendingFile {
                sender,
                recipient,
                requested_at: now,
            },
        );
        id
    }

    /// Consumes the request `id` if it was addressed to `replier`.
    pub fn take(&mut self, id: FileId, replier: ConnectionId) -> Option<PendingFile> {
        match self.pending.get(&id) {
            Some(pending) if pending.recipient == replier => self.pending.remove(&id),
            _ => None,
        }
    }

    pub fn is_addressed_to(&self, id: FileId, replier: ConnectionId) -> bool {
        self.pending
            .get(&id)
            .is_some_and(|pending| pending.recipient == replier)
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every request sent by or to `connection`.
    pub fn forget_connection(&mut self, connection: ConnectionId) {
        self.pending
            .retain(|_, pending| pending.sender != connection && pending.recipient != connection);
    }

    pub fn cleanup_expired(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        let ttl = self.ttl;
        self.pending
            .retain(|_, pending| now.saturating_duration_since(pending.requested_at) < ttl);
        before - self.pending.len()
    }
}

impl Default for FileRequests {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TTL)
    }
}
