use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    NotConnected,
    Connected,
    Away,
}

/// Messages a socket may have pending before its peer counts as too slow.
pub const OUTBOUND_CAPACITY: usize = 1024;

/// Queue feeding the writer task of one socket.
///
/// Sending never blocks. It fails once the writer task has gone away or when
/// the peer stopped reading and the queue is full.
#[derive(Debug, Clone)]
pub struct Outbound(mpsc::Sender<String>);

impl Outbound {
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Outbound(tx), rx)
    }

    fn send(&self, message: &str) -> bool {
        self.0.try_send(message.to_string()).is_ok()
    }
}

#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub address: SocketAddr,
    pub status: ConnectionStatus,
    pub nickname: Option<String>,
    /// Peers whose broadcasts this connection refuses.
    pub ignored: HashSet<ConnectionId>,
    /// Peers allowed to whisper with this connection. Always symmetric.
    pub private: HashSet<ConnectionId>,
    outbound: Outbound,
}

impl Connection {
    pub fn new(address: SocketAddr, outbound: Outbound) -> Self {
        Connection {
            id: ConnectionId::new(),
            address,
            status: ConnectionStatus::NotConnected,
            nickname: None,
            ignored: HashSet::new(),
            private: HashSet::new(),
            outbound,
        }
    }

    /// Returns `false` when the socket behind this connection is gone or
    /// its peer is not keeping up.
    pub fn write(&self, message: &str) -> bool {
        self.outbound.send(message)
    }

    pub fn display_name(&self) -> String {
        match &self.nickname {
            Some(nickname) => nickname.clone(),
            None => self.address.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Connections {
    by_id: HashMap<ConnectionId, Connection>,
}

impl Connections {
    pub fn insert(&mut self, connection: Connection) -> ConnectionId {
        let id = connection.id;
        self.by_id.insert(id, connection);
        id
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.by_id.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.by_id.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.by_id.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.by_id.values_mut()
    }
}
