//! Server network layer handling TCP connections and line framing

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, error, info, warn};
use shared::{Request, Response, LINE_TERMINATOR};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::hub::HubEvent;

/// Longest wait for writers to flush their queues once the hub is gone.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Accepts connections and bridges them to the hub
pub struct NetworkServer {
    listener: TcpListener,
    client_queue: usize,
}

impl NetworkServer {
    /// Binds the listener. `client_queue` is the depth of every client's
    /// outbound queue.
    pub async fn bind(addr: &str, client_queue: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            client_queue: client_queue.max(1),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Once the hub stops taking events the listener closes and
    /// this waits for every writer to flush what the hub queued last.
    pub async fn run(self, events: mpsc::UnboundedSender<HubEvent>) {
        let mut writers = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if !spawn_connection(stream, addr, &events, self.client_queue, &mut writers) {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                Some(_) = writers.join_next(), if !writers.is_empty() => {}
                _ = events.closed() => break,
            }
        }

        info!("Hub closed, listener stopped");
        drop(self.listener);
        let flushed = tokio::time::timeout(FLUSH_TIMEOUT, async {
            while writers.join_next().await.is_some() {}
        })
        .await;
        if flushed.is_err() {
            warn!("{} connections not flushed in {:?}", writers.len(), FLUSH_TIMEOUT);
        }
    }
}

/// Registers the connection with the hub and spawns its reader and writer
/// tasks. Returns false if the hub is gone.
fn spawn_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: &mpsc::UnboundedSender<HubEvent>,
    client_queue: usize,
    writers: &mut JoinSet<()>,
) -> bool {
    let (sender, receiver) = mpsc::channel(client_queue);
    if events.send(HubEvent::ClientJoined { addr, sender }).is_err() {
        return false;
    }
    let (reader, writer) = stream.into_split();
    tokio::spawn(read_requests(reader, addr, events.clone()));
    writers.spawn(write_responses(writer, addr, receiver));
    true
}

/// Decodes request lines until the client hangs up.
async fn read_requests(
    reader: OwnedReadHalf,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<HubEvent>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading from {}: {}", addr, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let event = match Request::from_line(&line) {
            Ok(request) => HubEvent::IncomingRequest { addr, request },
            Err(e) => {
                debug!("Bad line from {}: {}", addr, e);
                HubEvent::InvalidRequest { addr }
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
    let _ = events.send(HubEvent::ClientLeft { addr });
}

/// Drains the client's outbound queue onto the socket.
async fn write_responses(
    mut writer: OwnedWriteHalf,
    addr: SocketAddr,
    mut receiver: mpsc::Receiver<Response>,
) {
    while let Some(response) = receiver.recv().await {
        let mut line = match response.to_line() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode response for {}: {}", addr, e);
                continue;
            }
        };
        line.push_str(LINE_TERMINATOR);
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Error writing to {}: {}", addr, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
