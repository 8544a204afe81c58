//! Event hub: the single task owning sessions and pending confirmations.
//!
//! Connection tasks, request handlers and timers never touch the hub state.
//! They queue a [`HubEvent`] and the hub processes events strictly in
//! receive order. After every event, and once per broadcast interval, each
//! authenticated client receives a fresh world snapshot.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};
use shared::{response, Request, Response};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::ai;
use crate::config::ServerConfig;
use crate::confirm::{execute_trade, ConfirmationIds, ConfirmationRegistry, PendingConfirmation, Resolution};
use crate::error::RequestError;
use crate::router::{self, record_error, RequestContext};
use crate::session::{Session, SessionRegistry};
use crate::user::UserDirectory;
use crate::utils::get_timestamp_nanos;
use crate::world::script::{Script, ScriptRunner};
use crate::world::{Module, ObjectKey, World, WorldState};

/// Messages processed by the hub loop
#[derive(Debug)]
pub enum HubEvent {
    ClientJoined {
        addr: SocketAddr,
        sender: mpsc::Sender<Response>,
    },
    ClientLeft {
        addr: SocketAddr,
    },
    IncomingRequest {
        addr: SocketAddr,
        request: Request,
    },
    /// Line that could not be decoded
    InvalidRequest {
        addr: SocketAddr,
    },
    /// Response for whoever controls the character
    CharacterDirectedResponse {
        character: ObjectKey,
        response: Response,
    },
    ConfirmationRegistered(PendingConfirmation),
    /// Answer to a pending confirmation. No resolver means the system
    /// answered for a character no user owns.
    ConfirmationResolved {
        id: u64,
        resolver: Option<SocketAddr>,
        accepted: bool,
    },
    WorldReload(Module),
    ShutdownScheduled {
        deadline_nanos: i64,
    },
    Shutdown,
}

/// Central coordinator of the server
pub struct Hub {
    config: ServerConfig,
    /// Where the config is written back on shutdown
    config_path: Option<PathBuf>,
    users: UserDirectory,
    world: World,
    scripts: ScriptRunner,
    sessions: SessionRegistry,
    confirmations: ConfirmationRegistry,
    confirmation_ids: ConfirmationIds,

    events_tx: mpsc::UnboundedSender<HubEvent>,
    events_rx: mpsc::UnboundedReceiver<HubEvent>,
    shutdown_timer: Option<JoinHandle<()>>,
}

impl Hub {
    pub fn new(config: ServerConfig, users: UserDirectory, world: World) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            config_path: None,
            users,
            world,
            scripts: ScriptRunner::new(),
            sessions: SessionRegistry::new(),
            confirmations: ConfirmationRegistry::new(),
            confirmation_ids: ConfirmationIds::new(),
            events_tx,
            events_rx,
            shutdown_timer: None,
        }
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Queue for events from connection tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<HubEvent> {
        self.events_tx.clone()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn start_scripts(&mut self, scripts: &[Script]) {
        self.scripts.start(scripts, &self.world);
    }

    /// Main hub loop. Returns after the scheduled shutdown.
    pub async fn run(mut self) {
        let mut broadcast = interval(self.config.broadcast_interval);
        broadcast.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Hub started");
        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(HubEvent::Shutdown) | None => {
                            self.shutdown().await;
                            break;
                        }
                        Some(event) => {
                            self.handle_event(event).await;
                            self.send_snapshots().await;
                        }
                    }
                },

                _ = broadcast.tick() => {
                    self.reconcile_users().await;
                    self.send_snapshots().await;
                },
            }
        }
        info!("Hub stopped");
    }

    async fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::ClientJoined { addr, sender } => {
                let session = Session::new(addr, sender);
                session
                    .send(Response {
                        logon: true,
                        ..Default::default()
                    })
                    .await;
                self.sessions.add(session);
            }
            HubEvent::ClientLeft { addr } => self.client_left(addr).await,
            HubEvent::IncomingRequest { addr, request } => self.handle_request(addr, request).await,
            HubEvent::InvalidRequest { addr } => {
                let Some(session) = self.sessions.get(&addr) else {
                    return;
                };
                warn!("Hub: {}: invalid request line", addr);
                let response = Response {
                    logon: !session.authenticated(),
                    error: vec![format!("Unable to handle request: {}", RequestError::Syntax)],
                    ..Default::default()
                };
                session.send(response).await;
            }
            HubEvent::CharacterDirectedResponse {
                character,
                response,
            } => self.send_to_controller(&character, response).await,
            HubEvent::ConfirmationRegistered(confirmation) => {
                self.confirmations.register(confirmation);
            }
            HubEvent::ConfirmationResolved {
                id,
                resolver,
                accepted,
            } => self.resolve_confirmation(id, resolver, accepted).await,
            HubEvent::WorldReload(module) => self.reload(module).await,
            HubEvent::ShutdownScheduled { deadline_nanos } => {
                self.schedule_shutdown(deadline_nanos);
            }
            // Handled by the loop itself
            HubEvent::Shutdown => {}
        }
    }

    async fn handle_request(&mut self, addr: SocketAddr, request: Request) {
        let Some(session) = self.sessions.get_mut(&addr) else {
            warn!("Hub: request from unknown client: {}", addr);
            return;
        };
        let was_authenticated = session.authenticated();
        let (response, chapter_version) = {
            let mut state = self.world.write().await;
            let mut ctx = RequestContext {
                addr,
                session_user: &mut session.user_id,
                users: &mut self.users,
                config: &self.config,
                confirmation_ids: &mut self.confirmation_ids,
                events: &self.events_tx,
            };
            let response = router::handle(&mut ctx, &mut state, &request);
            (response, state.chapter_version())
        };
        if !was_authenticated && session.authenticated() {
            session.chapter_version = chapter_version;
        }
        session.send(response).await;
    }

    async fn client_left(&mut self, addr: SocketAddr) {
        let Some(session) = self.sessions.remove(&addr) else {
            return;
        };
        let mut controlled = Vec::new();
        if let Some(user) = session
            .user_id
            .as_deref()
            .and_then(|id| self.users.get_mut(id))
        {
            user.logged = false;
            let mut state = self.world.write().await;
            user.set_chars_active(&mut state, false);
            controlled = user
                .chars()
                .iter()
                .map(|c| ObjectKey::new(&c.id, &c.serial))
                .collect();
            info!("Hub: {}: user logged out: {}", addr, user.id());
        }
        let reaped = self.confirmations.reap(addr, &controlled);
        if !reaped.is_empty() {
            info!("Hub: {}: confirmations dropped: {:?}", addr, reaped);
        }
    }

    async fn send_to(&self, addr: &SocketAddr, response: Response) {
        if let Some(session) = self.sessions.get(addr) {
            session.send(response).await;
        }
    }

    /// Delivers the response to the first client controlling the character.
    /// Trades offered to characters no user owns are answered by the AI.
    async fn send_to_controller(&mut self, character: &ObjectKey, response: Response) {
        if let Some(addr) = self
            .sessions
            .controller_of(&self.users, &character.id, &character.serial)
        {
            self.send_to(&addr, response).await;
            return;
        }
        if self.users.owner_of(&character.id, &character.serial).is_some() {
            debug!("Hub: controller of {} offline, response dropped", character);
            return;
        }
        for trade in &response.trade {
            let Some(confirmation) = self.confirmations.get(trade.id) else {
                continue;
            };
            let accepted = {
                let state = self.world.read().await;
                ai::accepts_trade(&state, &confirmation.trade)
            };
            info!("Hub: AI answer for confirmation {}: {}", trade.id, accepted);
            if self
                .events_tx
                .send(HubEvent::ConfirmationResolved {
                    id: trade.id,
                    resolver: None,
                    accepted,
                })
                .is_err()
            {
                error!("Hub: own event queue closed");
            }
        }
    }

    async fn resolve_confirmation(&mut self, id: u64, resolver: Option<SocketAddr>, accepted: bool) {
        let kind = if accepted { "accept" } else { "reject" };
        let users = &self.users;
        let sessions = &self.sessions;
        let resolution = self.confirmations.resolve(id, |confirmation| match resolver {
            None => true,
            Some(addr) => sessions
                .get(&addr)
                .and_then(|s| s.user_id.as_deref())
                .and_then(|u| users.get(u))
                .map(|u| u.controls(&confirmation.target.id, &confirmation.target.serial))
                .unwrap_or(false),
        });

        let confirmation = match resolution {
            Resolution::Authorized(confirmation) => confirmation,
            Resolution::Unknown => {
                let err = RequestError::NotFound(format!("confirmation not found: {}", id));
                self.send_error(resolver, kind, &err).await;
                return;
            }
            Resolution::Unauthorized(confirmation) => {
                warn!("Hub: confirmation {} discarded: resolver does not control {}", id, confirmation.target);
                let err = RequestError::permission(&confirmation.target.id, &confirmation.target.serial);
                self.send_error(resolver, kind, &err).await;
                return;
            }
        };

        if !accepted {
            info!("Hub: confirmation {} rejected", id);
            let err = RequestError::CapabilityMismatch(format!("trade rejected: {}", id));
            self.send_error(Some(confirmation.origin), "trade", &err).await;
            return;
        }

        let result = {
            let mut state = self.world.write().await;
            execute_trade(&mut state, &confirmation.trade)
        };
        match result {
            Ok(()) => {
                info!("Hub: confirmation {} executed", id);
                let completed = Response {
                    trade_completed: vec![confirmation.view()],
                    ..Default::default()
                };
                if let Some(addr) = resolver.filter(|a| *a != confirmation.origin) {
                    self.send_to(&addr, completed.clone()).await;
                }
                self.send_to(&confirmation.origin, completed).await;
            }
            Err(err) => {
                if let Some(addr) = resolver.filter(|a| *a != confirmation.origin) {
                    self.send_error(Some(addr), kind, &err).await;
                }
                self.send_error(Some(confirmation.origin), "trade", &err).await;
            }
        }
    }

    async fn send_error(&self, addr: Option<SocketAddr>, kind: &str, err: &RequestError) {
        let Some(addr) = addr else {
            warn!("Hub: system {} failed: {}", kind, err);
            return;
        };
        let mut response = Response::default();
        record_error(addr, &mut response, kind, err);
        self.send_to(&addr, response).await;
    }

    async fn reload(&mut self, module: Module) {
        info!("Hub: reloading world: {}", module.data.id);
        self.scripts.stop_all();
        let chapter_version = {
            let mut state = WorldState::import(&module.data);
            for session in self.sessions.iter() {
                if let Some(user) = session.user_id.as_deref().and_then(|id| self.users.get_mut(id)) {
                    user.reconcile_chars(&state);
                    user.set_chars_active(&mut state, true);
                }
            }
            let version = state.chapter_version();
            self.world.replace(state).await;
            version
        };
        self.scripts.start(&module.scripts, &self.world);

        let notice = Response {
            load: Some(response::Load {
                module: module.data,
            }),
            ..Default::default()
        };
        for session in self.sessions.iter_mut().filter(|s| s.authenticated()) {
            session.chapter_version = chapter_version;
            session.send(notice.clone()).await;
        }
    }

    fn schedule_shutdown(&mut self, deadline_nanos: i64) {
        let delay = Duration::from_nanos(deadline_nanos.saturating_sub(get_timestamp_nanos()).max(0) as u64);
        if let Some(timer) = self.shutdown_timer.take() {
            timer.abort();
        }
        info!("Hub: shutdown scheduled in {:?}", delay);
        let events = self.events_tx.clone();
        self.shutdown_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(HubEvent::Shutdown).is_err() {
                warn!("Hub: gone before scheduled shutdown");
            }
        }));
    }

    async fn shutdown(&mut self) {
        info!("Hub: shutting down");
        self.scripts.stop_all();
        let closed = Response {
            closed: true,
            ..Default::default()
        };
        for session in self.sessions.iter().filter(|s| s.authenticated()) {
            session.send(closed.clone()).await;
        }
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save(path) {
                error!("Hub: {}", e);
            }
        }
        if let Err(e) = self.users.save(&self.config.users_dir) {
            error!("Hub: {}", e);
        }
    }

    /// Refreshes the characters owned by logged users.
    async fn reconcile_users(&mut self) {
        let state = self.world.read().await;
        for session in self.sessions.iter() {
            if let Some(user) = session.user_id.as_deref().and_then(|id| self.users.get_mut(id)) {
                user.reconcile_chars(&state);
            }
        }
    }

    /// Sends the world snapshot to every authenticated client.
    async fn send_snapshots(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        let (module, paused, chapter_version) = {
            let state = self.world.read().await;
            (state.export(), state.paused(), state.chapter_version())
        };
        for session in self.sessions.iter_mut() {
            let Some(user) = session.user_id.as_deref().and_then(|id| self.users.get(id)) else {
                continue;
            };
            let snapshot = Response {
                paused,
                change_chapter: session.chapter_version != chapter_version,
                update: Some(response::Update {
                    module: module.clone(),
                    message: self.config.message.clone(),
                }),
                character: user
                    .chars()
                    .iter()
                    .map(|c| response::Character {
                        id: c.id.clone(),
                        serial: c.serial.clone(),
                    })
                    .collect(),
                ..Default::default()
            };
            session.chapter_version = chapter_version;
            session.send(snapshot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::testing::{users, world};
    use crate::world::object::INACTIVE_FLAG;
    use tokio::sync::mpsc::Receiver;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn hub() -> Hub {
        Hub::new(ServerConfig::default(), users(), World::new(world()))
    }

    /// Handles the event and everything it queues, like the run loop does
    /// minus the snapshots.
    async fn process(hub: &mut Hub, event: HubEvent) {
        hub.handle_event(event).await;
        while let Ok(event) = hub.events_rx.try_recv() {
            hub.handle_event(event).await;
        }
    }

    async fn join(hub: &mut Hub, port: u16) -> Receiver<Response> {
        let (sender, mut receiver) = mpsc::channel(64);
        process(hub, HubEvent::ClientJoined { addr: addr(port), sender }).await;
        assert!(receiver.try_recv().unwrap().logon);
        receiver
    }

    async fn request(hub: &mut Hub, port: u16, line: &str) {
        let request = Request::from_line(line).unwrap();
        process(hub, HubEvent::IncomingRequest { addr: addr(port), request }).await;
    }

    async fn login(hub: &mut Hub, port: u16, user: &str, pass: &str) -> Receiver<Response> {
        let mut receiver = join(hub, port).await;
        let line = format!(r#"{{"login":[{{"id":"{}","pass":"{}"}}]}}"#, user, pass);
        request(hub, port, &line).await;
        let response = receiver.try_recv().unwrap();
        assert!(response.error.is_empty(), "{:?}", response.error);
        receiver
    }

    fn drain(receiver: &mut Receiver<Response>) -> Vec<Response> {
        let mut responses = Vec::new();
        while let Ok(response) = receiver.try_recv() {
            responses.push(response);
        }
        responses
    }

    const TRADE: &str = r#"{"trade":[{
        "buy":{"object-from-id":"merchant","object-from-serial":"2","object-to-id":"hero","object-to-serial":"0","items":{"shield":["20"]}},
        "sell":{"object-from-id":"hero","object-from-serial":"0","object-to-id":"merchant","object-to-serial":"2","items":{"gold":["10"]}}
    }]}"#;

    #[tokio::test]
    async fn test_unauthenticated_client_gets_no_snapshot() {
        let mut hub = hub();
        let mut anonymous = join(&mut hub, 5000).await;
        let mut alice = login(&mut hub, 5001, "alice", "pw").await;

        hub.send_snapshots().await;

        assert!(drain(&mut anonymous).is_empty());
        let snapshots = drain(&mut alice);
        assert_eq!(snapshots.len(), 1);
        let snapshot = &snapshots[0];
        assert_eq!(snapshot.update.as_ref().unwrap().module.id, "test");
        assert_eq!(snapshot.character.len(), 2);
        assert!(!snapshot.change_chapter);
    }

    #[tokio::test]
    async fn test_invalid_request_answered_with_error() {
        let mut hub = hub();
        let mut client = join(&mut hub, 5000).await;

        process(&mut hub, HubEvent::InvalidRequest { addr: addr(5000) }).await;

        let response = client.try_recv().unwrap();
        assert!(response.logon);
        assert_eq!(response.error, vec!["Unable to handle request: invalid request syntax"]);
    }

    #[tokio::test]
    async fn test_directed_response_reaches_controller() {
        let mut hub = hub();
        let mut alice = login(&mut hub, 5000, "alice", "pw").await;
        let mut bob = login(&mut hub, 5001, "bob", "pw").await;

        request(&mut hub, 5000, r#"{"chat":[{"object-id":"hero","object-serial":"0","message":"hi"}]}"#).await;

        let alice_chat: Vec<_> = drain(&mut alice).into_iter().filter(|r| !r.chat.is_empty()).collect();
        let bob_chat: Vec<_> = drain(&mut bob).into_iter().filter(|r| !r.chat.is_empty()).collect();
        // hero and squire are both alice's and in sight
        assert_eq!(alice_chat.len(), 2);
        // merchant is in sight, far is not
        assert_eq!(bob_chat.len(), 1);
        assert_eq!(bob_chat[0].chat[0].message, "hi");
    }

    #[tokio::test]
    async fn test_trade_accepted_by_seller() {
        let mut hub = hub();
        let mut alice = login(&mut hub, 5000, "alice", "pw").await;
        let mut bob = login(&mut hub, 5001, "bob", "pw").await;

        request(&mut hub, 5000, TRADE).await;
        let ack = alice.try_recv().unwrap();
        let id = ack.trade[0].id;
        let offer = bob.try_recv().unwrap();
        assert_eq!(offer.trade[0].id, id);
        assert_eq!(hub.confirmations.len(), 1);

        request(&mut hub, 5001, &format!(r#"{{"accept":[{}]}}"#, id)).await;

        assert!(hub.confirmations.is_empty());
        let completed = drain(&mut alice);
        assert!(completed.iter().any(|r| r.trade_completed.len() == 1));
        assert!(drain(&mut bob).iter().any(|r| r.trade_completed.len() == 1));
        let state = hub.world.read().await;
        let hero = state.character("hero", "0").unwrap();
        let merchant = state.character("merchant", "2").unwrap();
        assert!(hero.inventory.item("shield", "20").is_some());
        assert!(hero.inventory.item("gold", "10").is_none());
        assert!(merchant.inventory.item("gold", "10").is_some());
    }

    #[tokio::test]
    async fn test_accept_from_non_controller_discards() {
        let mut hub = hub();
        let mut alice = login(&mut hub, 5000, "alice", "pw").await;
        let _bob = login(&mut hub, 5001, "bob", "pw").await;
        request(&mut hub, 5000, TRADE).await;
        let id = alice.try_recv().unwrap().trade[0].id;

        request(&mut hub, 5000, &format!(r#"{{"accept":[{}]}}"#, id)).await;

        assert!(hub.confirmations.is_empty());
        let errors: Vec<String> = drain(&mut alice).into_iter().flat_map(|r| r.error).collect();
        assert_eq!(errors, vec!["Unable to handle accept request: object not controlled: merchant 2"]);
        let state = hub.world.read().await;
        assert!(state.character("hero", "0").unwrap().inventory.item("shield", "20").is_none());
    }

    #[tokio::test]
    async fn test_reject_notifies_buyer() {
        let mut hub = hub();
        let mut alice = login(&mut hub, 5000, "alice", "pw").await;
        let _bob = login(&mut hub, 5001, "bob", "pw").await;
        request(&mut hub, 5000, TRADE).await;
        let id = alice.try_recv().unwrap().trade[0].id;

        request(&mut hub, 5001, &format!(r#"{{"reject":[{}]}}"#, id)).await;

        assert!(hub.confirmations.is_empty());
        let errors: Vec<String> = drain(&mut alice).into_iter().flat_map(|r| r.error).collect();
        assert_eq!(errors, vec![format!("Unable to handle trade request: trade rejected: {}", id)]);
    }

    #[tokio::test]
    async fn test_ai_seller_accepts_fair_offer() {
        let mut hub = hub();
        let mut alice = login(&mut hub, 5000, "alice", "pw").await;

        request(
            &mut hub,
            5000,
            r#"{"trade":[{
                "buy":{"object-from-id":"trader","object-from-serial":"3","object-to-id":"hero","object-to-serial":"0","items":{"map":["30"]}},
                "sell":{"object-from-id":"hero","object-from-serial":"0","object-to-id":"trader","object-to-serial":"3","items":{"gold":["10"]}}
            }]}"#,
        )
        .await;

        assert!(hub.confirmations.is_empty());
        assert!(drain(&mut alice).iter().any(|r| r.trade_completed.len() == 1));
        let state = hub.world.read().await;
        assert!(state.character("hero", "0").unwrap().inventory.item("map", "30").is_some());
        assert!(state.character("trader", "3").unwrap().inventory.item("gold", "10").is_some());
    }

    #[tokio::test]
    async fn test_client_left_logs_out_and_reaps() {
        let mut hub = hub();
        let mut alice = login(&mut hub, 5000, "alice", "pw").await;
        let _bob = login(&mut hub, 5001, "bob", "pw").await;
        request(&mut hub, 5000, TRADE).await;
        assert!(alice.try_recv().is_ok());
        assert_eq!(hub.confirmations.len(), 1);

        process(&mut hub, HubEvent::ClientLeft { addr: addr(5001) }).await;

        assert!(hub.confirmations.is_empty());
        assert_eq!(hub.sessions.len(), 1);
        assert!(!hub.users.get("bob").unwrap().logged);
        let state = hub.world.read().await;
        assert!(state.character("merchant", "2").unwrap().has_flag(INACTIVE_FLAG));
        drop(state);

        // bob may log in again
        let _bob = login(&mut hub, 5002, "bob", "pw").await;
    }

    #[tokio::test]
    async fn test_chapter_change_flagged_once() {
        let mut hub = hub();
        let mut root = login(&mut hub, 5000, "root", "toor").await;
        hub.send_snapshots().await;
        assert!(!drain(&mut root)[0].change_chapter);

        request(&mut hub, 5000, r#"{"command":["moduleman -o set-chapter -a ch2"]}"#).await;
        assert_eq!(root.try_recv().unwrap().command[0].result, crate::command::RESULT_OK);

        hub.send_snapshots().await;
        assert!(drain(&mut root)[0].change_chapter);
        hub.send_snapshots().await;
        assert!(!drain(&mut root)[0].change_chapter);
    }

    #[tokio::test]
    async fn test_reload_notifies_clients() {
        let mut hub = hub();
        let mut alice = login(&mut hub, 5000, "alice", "pw").await;
        let mut data = world().export();
        data.id = "reloaded".to_string();

        process(
            &mut hub,
            HubEvent::WorldReload(Module {
                data,
                scripts: Vec::new(),
            }),
        )
        .await;

        let notice = alice.try_recv().unwrap();
        assert_eq!(notice.load.unwrap().module.id, "reloaded");
        assert_eq!(hub.world.read().await.module_id(), "reloaded");
    }

    #[tokio::test]
    async fn test_shutdown_sends_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.users_dir = dir.path().join("users");
        let hub = Hub::new(config.clone(), users(), World::new(world()));
        let events = hub.sender();
        let (sender, mut client) = mpsc::channel(64);
        events.send(HubEvent::ClientJoined { addr: addr(5000), sender }).unwrap();
        events
            .send(HubEvent::IncomingRequest {
                addr: addr(5000),
                request: Request::from_line(r#"{"login":[{"id":"root","pass":"toor"}]}"#).unwrap(),
            })
            .unwrap();
        events
            .send(HubEvent::IncomingRequest {
                addr: addr(5000),
                request: Request {
                    close: Some(get_timestamp_nanos() + 20_000_000),
                    ..Default::default()
                },
            })
            .unwrap();

        let run = tokio::spawn(hub.run());
        let mut closed = false;
        while let Some(response) = client.recv().await {
            if response.closed {
                closed = true;
                break;
            }
        }
        run.await.unwrap();

        assert!(closed);
        assert!(config.users_dir.join("alice").join(crate::user::USER_FILE_NAME).is_file());
    }
}
