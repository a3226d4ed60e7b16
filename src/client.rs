use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::connection::ConnectionId;
use crate::error::RegistryError;

pub const MAX_NICKNAME_LEN: usize = 10;

/// A logged-in chat user.
#[derive(Debug, Clone)]
pub struct Client {
    pub nickname: String,
    pub connection: ConnectionId,
    pub address: SocketAddr,
}

impl Client {
    pub fn new(nickname: String, connection: ConnectionId, address: SocketAddr) -> Self {
        Client {
            nickname,
            connection,
            address,
        }
    }

    /// At most ten characters, no leading `@` and no `,`.
    pub fn is_valid_nickname(nickname: &str) -> bool {
        !nickname.is_empty()
            && nickname.chars().count() <= MAX_NICKNAME_LEN
            && !nickname.starts_with('@')
            && !nickname.contains(',')
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.nickname == other.nickname
    }
}

impl Eq for Client {}

/// Logged-in clients keyed by nickname, iterated in nickname order.
#[derive(Debug, Default)]
pub struct Clients {
    clients: BTreeMap<String, Client>,
}

impl Clients {
    pub fn add(&mut self, client: Client) -> Result<(), RegistryError> {
        if self.clients.contains_key(&client.nickname) {
            return Err(RegistryError::AlreadyTaken(client.nickname));
        }
        self.clients.insert(client.nickname.clone(), client);
        Ok(())
    }

    pub fn remove(&mut self, nickname: &str) -> Option<Client> {
        self.clients.remove(nickname)
    }

    /// Re-keys `old` under `new`. Nothing is touched when `old` is unknown
    /// or `new` is taken.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), RegistryError> {
        if self.clients.contains_key(new) {
            return Err(RegistryError::AlreadyTaken(new.to_string()));
        }
        let mut client = self
            .clients
            .remove(old)
            .ok_or_else(|| RegistryError::NotFound(old.to_string()))?;
        client.nickname = new.to_string();
        self.clients.insert(client.nickname.clone(), client);
        Ok(())
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.clients.contains_key(nickname)
    }

    pub fn by_nickname(&self, nickname: &str) -> Result<&Client, RegistryError> {
        self.clients
            .get(nickname)
            .ok_or_else(|| RegistryError::NotFound(nickname.to_string()))
    }

    pub fn by_address(&self, address: SocketAddr) -> Option<&Client> {
        self.clients.values().find(|client| client.address == address)
    }

    pub fn nicknames(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
