use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::bot::{Bot, ChatBot};
use crate::client::Clients;
use crate::commands::CommandDispatcher;
use crate::connection::{Connection, ConnectionId, ConnectionStatus, Connections, Outbound};
use crate::error::DncError;
use crate::files::FileRequests;
use crate::messages::Notice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Closed by the server after a `QUIT`.
    Closed,
    /// Hung up, reset or unwritable without a `QUIT`.
    Lost,
}

/// State shared by every connection speaking DNC.
pub struct DncProtocol {
    pub clients: Clients,
    pub connections: Connections,
    pub files: FileRequests,
    pub bot: Box<dyn ChatBot>,
    commands: Arc<CommandDispatcher>,
    closing: Vec<(ConnectionId, Teardown)>,
}

impl DncProtocol {
    pub fn new(file_request_ttl: Duration) -> Self {
        DncProtocol {
            clients: Clients::default(),
            connections: Connections::default(),
            files: FileRequests::new(file_request_ttl),
            bot: Box::new(Bot),
            commands: Arc::new(CommandDispatcher::default()),
            closing: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_commands(mut self, commands: CommandDispatcher) -> Self {
        self.commands = Arc::new(commands);
        self
    }

    #[must_use]
    pub fn with_bot(mut self, bot: impl ChatBot + 'static) -> Self {
        self.bot = Box::new(bot);
        self
    }

    pub fn create_new_connection(
        &mut self,
        address: SocketAddr,
        outbound: Outbound,
    ) -> ConnectionId {
        self.connections.insert(Connection::new(address, outbound))
    }

    pub fn on_connection_started(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.get(id) {
            info!("NEW CONNECTION: {} ({id})", connection.address);
        }
    }

    /// Serves every request line of `data`, writing replies back to `id`.
    pub fn on_data_received(&mut self, id: ConnectionId, data: &str) {
        for line in data.lines() {
            if self.is_closing(id) {
                break;
            }
            if let Some(response) = self.respond(id, line) {
                self.write(id, &response);
            }
        }
    }

    /// Serves one request line and returns what should be written back, if anything.
    pub fn respond(&mut self, id: ConnectionId, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        let name = self.display_name(id);
        info!("from {name} received: {line}");

        let commands = Arc::clone(&self.commands);
        match commands.react(self, id, line) {
            Ok(reply) => reply.map(|reply| reply.to_string()),
            Err(DncError::Internal(detail)) => {
                error!("internal error while serving {name} ({line}): {detail}");
                Some(DncError::Internal(detail).to_string())
            }
            Err(err) => {
                debug!("refused {line} from {name}: {err}");
                Some(err.to_string())
            }
        }
    }

    pub fn connection(&self, id: ConnectionId) -> Result<&Connection, DncError> {
        self.connections
            .get(id)
            .ok_or_else(|| DncError::Internal(format!("no connection {id}")))
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut Connection, DncError> {
        self.connections
            .get_mut(id)
            .ok_or_else(|| DncError::Internal(format!("no connection {id}")))
    }

    fn display_name(&self, id: ConnectionId) -> String {
        self.connections
            .get(id)
            .map_or_else(|| id.to_string(), Connection::display_name)
    }

    /// Whether `receiver` may see a broadcast coming from `sender`.
    pub fn allows_to_send(sender: &Connection, receiver: &Connection) -> bool {
        receiver.nickname.is_some()
            && sender.status != ConnectionStatus::NotConnected
            && !receiver.ignored.contains(&sender.id)
    }

    pub fn write(&mut self, id: ConnectionId, message: &str) {
        let Some(connection) = self.connections.get(id) else {
            return;
        };
        if !connection.write(message) {
            self.schedule_close(id, Teardown::Lost);
        }
    }

    /// Sends `message` to the client currently named `nickname`.
    pub fn write_to(&mut self, nickname: &str, message: &str) -> Result<(), DncError> {
        let target = self.clients.by_nickname(nickname)?.connection;
        if !self.connections.contains(target) {
            return Err(DncError::NicknameNotExist(Vec::new()));
        }
        self.write(target, message);
        Ok(())
    }

    /// Broadcasts to every other connection allowed to hear `sender`.
    pub fn write_all(&mut self, sender: ConnectionId, message: &str) {
        let Some(from) = self.connections.get(sender) else {
            return;
        };
        let failed: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|receiver| receiver.id != sender && Self::allows_to_send(from, receiver))
            .filter(|receiver| !receiver.write(message))
            .map(|receiver| receiver.id)
            .collect();

        for id in failed {
            self.schedule_close(id, Teardown::Lost);
        }
    }

    pub fn close(&mut self, id: ConnectionId) {
        self.schedule_close(id, Teardown::Closed);
    }

    fn schedule_close(&mut self, id: ConnectionId, teardown: Teardown) {
        if !self.is_closing(id) {
            self.closing.push((id, teardown));
        }
    }

    pub fn is_closing(&self, id: ConnectionId) -> bool {
        self.closing.iter().any(|(closing, _)| *closing == id)
    }

    /// Connections waiting to be torn down by the server, oldest first.
    pub fn take_closing(&mut self) -> Vec<(ConnectionId, Teardown)> {
        std::mem::take(&mut self.closing)
    }

    pub fn teardown(&mut self, id: ConnectionId, teardown: Teardown) {
        match teardown {
            Teardown::Closed => self.on_connection_closed(id),
            Teardown::Lost => self.on_connection_lost(id),
        }
    }

    pub fn on_connection_closed(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.remove(id) else {
            return;
        };
        info!("CONNECTION CLOSED: {}", connection.display_name());

        if let Some(nickname) = &connection.nickname {
            self.clients.remove(nickname);
        }
        for peer in &connection.private {
            if let Some(peer) = self.connections.get_mut(*peer) {
                peer.private.remove(&id);
            }
        }
        for peer in self.connections.iter_mut() {
            peer.ignored.remove(&id);
        }
        self.files.forget_connection(id);
    }

    /// Tells the others that the client left, then closes the connection.
    pub fn on_connection_lost(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.get(id) else {
            return;
        };
        info!("CONNECTION LOST: {}", connection.display_name());

        if let Some(nickname) = connection.nickname.clone() {
            self.write_all(id, &Notice::Quit { reason: None }.by(&nickname));
        }
        self.on_connection_closed(id);
    }

    pub fn reap_file_requests(&mut self, now: Instant) {
        let reaped = self.files.cleanup_expired(now);
        if reaped > 0 {
            debug!("dropped {reaped} expired file request(s)");
        }
    }
}
