//! # Game Server Library
//!
//! This library provides the authoritative server for the multiplayer role-playing
//! game. It accepts persistent TCP connections, authenticates users, routes their
//! requests into the shared game world and streams world snapshots and events back
//! to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Every TCP connection becomes a session keyed by its remote address. A session
//! starts unauthenticated and only ever receives `logon` and error responses until
//! a login succeeds. A user may hold at most one session at a time.
//!
//! ### Request Routing
//! Each request line may batch several request kinds. The router handles them in
//! a fixed order, login first, and collects every failure into the response error
//! list so one bad sub-request never stops the rest of the batch.
//!
//! ### Trade Confirmation
//! Trades are two-phase. The buyer's request only registers a pending
//! confirmation and notifies the seller's controller; inventories change once the
//! seller accepts. Sellers no user owns are answered by a simple AI.
//!
//! ### Notification
//! Responses reach clients three ways: directed to the controller of a character,
//! fanned out to everything in sight of an object, or sent to every authenticated
//! client.
//!
//! ## Architecture Design
//!
//! ### Single Event Hub
//! One task, the [`hub::Hub`], owns the session registry and the confirmation
//! registry. Connection tasks and request handlers talk to it over one unbounded
//! channel, so events are processed strictly in receive order and no registry is
//! ever shared between tasks.
//!
//! ### Per-Connection Tasks
//! Every connection has a reader task decoding `\r\n` terminated JSON lines and a
//! writer task draining a bounded outbound queue. A full queue makes the hub wait.
//!
//! ### Independent Simulation
//! The world updates on its own task behind a `tokio::sync::RwLock`. Handlers
//! tolerate objects that moved or vanished between requests.
//!
//! ## Module Organization
//!
//! - `hub` - event loop, snapshots, confirmation resolution, shutdown
//! - `network` - TCP listener and per-connection reader/writer tasks
//! - `router` - per-request validation and execution
//! - `confirm` - pending confirmations and trade execution
//! - `session` - connected clients and their outbound queues
//! - `user` - user directory and credential files
//! - `world` - world state, objects, scripts and module files
//! - `command` - admin command facility
//! - `ai` - decisions for characters no user owns
//! - `config` - key-list configuration file
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::hub::Hub;
//! use server::network::NetworkServer;
//! use server::user::UserDirectory;
//! use server::world::{load_module, World, WorldState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let module = load_module(&config.module_path())?;
//!     let world = World::new(WorldState::import(&module.data));
//!     tokio::spawn(world.clone().run_updates(config.update_break));
//!
//!     let mut hub = Hub::new(config.clone(), UserDirectory::new(), world);
//!     hub.start_scripts(&module.scripts);
//!
//!     let network = NetworkServer::bind(&config.address(), config.client_queue).await?;
//!     tokio::spawn(network.run(hub.sender()));
//!     hub.run().await;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod command;
pub mod config;
pub mod confirm;
pub mod error;
pub mod hub;
pub mod network;
pub mod router;
pub mod session;
pub mod user;
pub mod utils;
pub mod world;
