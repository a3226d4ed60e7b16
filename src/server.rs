use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::{ConnectionId, Outbound};
use crate::protocol::{DncProtocol, Teardown};

pub const READ_BUFFER_SIZE: usize = 2048;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const BACKLOG: u32 = 128;
/// Pause after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
enum Event {
    Data(ConnectionId, String),
    /// Hung up (`None`) or reset.
    Gone(ConnectionId, Option<io::Error>),
}

/// Single-task event loop owning every client socket.
pub struct Server {
    listener: TcpListener,
    protocol: DncProtocol,
    readers: HashMap<ConnectionId, JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl Server {
    pub fn bind(addr: SocketAddr, protocol: DncProtocol) -> io::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(BACKLOG)?;
        info!("Server is waiting (ADDR={})", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Server {
            listener,
            protocol,
            readers: HashMap::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until Ctrl-C.
    pub async fn run_forever(self, poll_interval: Duration) -> io::Result<()> {
        self.run_until(poll_interval, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    pub async fn run_until(
        mut self,
        poll_interval: Duration,
        stop: impl Future<Output = ()>,
    ) -> io::Result<()> {
        tokio::pin!(stop);
        let mut ticker = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                () = &mut stop => {
                    info!("Closing...");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.handle_new_connection(stream, peer),
                    Err(e) => accept_failed(&e).await,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = ticker.tick() => self.protocol.reap_file_requests(Instant::now()),
            }
            self.flush_closing();
        }

        for (_, reader) in self.readers.drain() {
            reader.abort();
        }
        Ok(())
    }

    fn handle_new_connection(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Unable to set TCP_NODELAY for {peer}: {e}");
        }
        let (reader, writer) = stream.into_split();
        let (outbound, rx) = Outbound::channel();
        tokio::spawn(write_loop(writer, rx, peer));

        let id = self.protocol.create_new_connection(peer, outbound);
        let reader = tokio::spawn(read_loop(id, reader, self.events_tx.clone()));
        self.readers.insert(id, reader);

        self.protocol.on_connection_started(id);
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Data(id, data) => {
                if self.readers.contains_key(&id) {
                    self.protocol.on_data_received(id, &data);
                }
            }
            Event::Gone(id, error) => {
                match error {
                    Some(e) => debug!("{id} reset: {e}"),
                    None => debug!("{id} hung up"),
                }
                self.teardown(id, Teardown::Lost);
            }
        }
    }

    /// Tears down everything the protocol queued, including failures the
    /// teardowns themselves cause.
    fn flush_closing(&mut self) {
        loop {
            let closing = self.protocol.take_closing();
            if closing.is_empty() {
                break;
            }
            for (id, teardown) in closing {
                self.teardown(id, teardown);
            }
        }
    }

    fn teardown(&mut self, id: ConnectionId, teardown: Teardown) {
        let Some(reader) = self.readers.remove(&id) else {
            return;
        };
        reader.abort();
        self.protocol.teardown(id, teardown);
    }
}

async fn accept_failed(error: &io::Error) {
    warn!("Failed to accept a connection: {error}");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

async fn read_loop(
    id: ConnectionId,
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        let event = match reader.read(&mut buffer).await {
            Ok(0) => Event::Gone(id, None),
            Ok(n) => Event::Data(id, String::from_utf8_lossy(&buffer[..n]).into_owned()),
            Err(e) => Event::Gone(id, Some(e)),
        };
        let last = !matches!(event, Event::Data(..));
        if events.send(event).is_err() || last {
            break;
        }
    }
}

/// Drains the outbound queue into the socket. Ends on the first write error
/// or once the connection is dropped, after flushing what was queued.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
    peer: SocketAddr,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = writer.write_all(message.as_bytes()).await {
            warn!("Failed to write to {peer}: {e}");
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Failed to shut down {peer}: {e}");
    }
}
