//! Client sessions of the event hub.
//!
//! This module tracks every connected client:
//! - Connection lifecycle (join, leave)
//! - The user bound to the connection after a successful login
//! - The outbound queue drained by the connection's writer task
//!
//! The registry is owned by the hub task alone, so it needs no locking.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

use log::{info, warn};
use shared::Response;
use tokio::sync::mpsc;

use crate::user::UserDirectory;

/// One client connection.
#[derive(Debug)]
pub struct Session {
    /// Remote address, the stable key of the session
    pub addr: SocketAddr,
    /// ID of the user bound by login
    pub user_id: Option<String>,
    /// Chapter version the client was last told about
    pub chapter_version: u64,
    /// Time of the connection
    pub joined: Instant,
    sender: mpsc::Sender<Response>,
}

impl Session {
    /// Creates an unauthenticated session writing to the specified queue.
    pub fn new(addr: SocketAddr, sender: mpsc::Sender<Response>) -> Self {
        Self {
            addr,
            user_id: None,
            chapter_version: 0,
            joined: Instant::now(),
            sender,
        }
    }

    pub fn authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Queues the response for the writer task.
    ///
    /// Waits while the queue is full. Returns false if the writer is gone.
    pub async fn send(&self, response: Response) -> bool {
        match self.sender.send(response).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Session {}: writer closed, response dropped", self.addr);
                false
            }
        }
    }
}

/// All connected clients keyed by remote address.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SocketAddr, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. A stale session with the same address is
    /// replaced.
    pub fn add(&mut self, session: Session) {
        info!("Client connected: {}", session.addr);
        self.sessions.insert(session.addr, session);
    }

    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Session> {
        let session = self.sessions.remove(addr)?;
        info!(
            "Client disconnected: {}, connected for {:?}",
            addr,
            session.joined.elapsed()
        );
        Some(session)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&Session> {
        self.sessions.get(addr)
    }

    pub fn get_mut(&mut self, addr: &SocketAddr) -> Option<&mut Session> {
        self.sessions.get_mut(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// Addresses of all sessions with a logged user.
    pub fn authenticated(&self) -> Vec<SocketAddr> {
        self.sessions
            .values()
            .filter(|s| s.authenticated())
            .map(|s| s.addr)
            .collect()
    }

    /// Finds the first session whose user controls the specified character.
    pub fn controller_of(
        &self,
        users: &UserDirectory,
        id: &str,
        serial: &str,
    ) -> Option<SocketAddr> {
        self.sessions
            .values()
            .find(|s| {
                s.user_id
                    .as_deref()
                    .and_then(|u| users.get(u))
                    .map(|u| u.controls(id, serial))
                    .unwrap_or(false)
            })
            .map(|s| s.addr)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
