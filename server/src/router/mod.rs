//! Request router.
//!
//! Validates and executes one decoded request line against the world. Each
//! request kind has its own handler returning `Result<(), RequestError>`;
//! [`handle`] runs all sub-requests of a line in a fixed order and collects
//! their failures into the response error list, so one bad sub-request never
//! stops the rest of the batch.
//!
//! Handlers never touch the session or confirmation registries directly.
//! Anything the hub has to do on their behalf is queued as a [`HubEvent`].

pub mod admin;
pub mod character;
pub mod dialog;
pub mod items;
pub mod login;

use std::net::SocketAddr;

use log::{error, warn};
use shared::request::ItemList;
use shared::{Request, Response};
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::confirm::ConfirmationIds;
use crate::error::RequestError;
use crate::hub::HubEvent;
use crate::user::{User, UserDirectory};
use crate::world::{ObjectKey, WorldObject, WorldState};

/// Everything a handler may read or change besides the world.
pub struct RequestContext<'a> {
    /// Address of the requesting client
    pub addr: SocketAddr,
    /// User bound to the requesting session
    pub session_user: &'a mut Option<String>,
    pub users: &'a mut UserDirectory,
    pub config: &'a ServerConfig,
    pub confirmation_ids: &'a mut ConfirmationIds,
    /// Queue of the hub, for deferred side effects
    pub events: &'a mpsc::UnboundedSender<HubEvent>,
}

impl RequestContext<'_> {
    /// User of the requesting session.
    pub fn user(&self) -> Result<&User, RequestError> {
        self.session_user
            .as_deref()
            .and_then(|id| self.users.get(id))
            .ok_or_else(|| RequestError::Auth("not logged in".to_string()))
    }

    pub fn user_mut(&mut self) -> Result<&mut User, RequestError> {
        let id = self
            .session_user
            .as_deref()
            .ok_or_else(|| RequestError::Auth("not logged in".to_string()))?;
        self.users
            .get_mut(id)
            .ok_or_else(|| RequestError::Auth("not logged in".to_string()))
    }

    /// Fails with a permission error unless the user controls the object.
    pub fn check_controls(&self, id: &str, serial: &str) -> Result<(), RequestError> {
        if self.user()?.controls(id, serial) {
            Ok(())
        } else {
            Err(RequestError::permission(id, serial))
        }
    }

    pub fn check_admin(&self) -> Result<(), RequestError> {
        if self.user()?.admin() {
            Ok(())
        } else {
            Err(RequestError::Auth("admin privileges required".to_string()))
        }
    }

    /// Queues an event for the hub. A closed hub only happens at shutdown,
    /// so the event is logged and dropped.
    pub fn emit(&self, event: HubEvent) {
        if let Err(e) = self.events.send(event) {
            warn!("Router: hub queue closed, event dropped: {:?}", e.0);
        }
    }
}

type Handler<R> =
    fn(&mut RequestContext<'_>, &mut WorldState, &R, &mut Response) -> Result<(), RequestError>;

fn handle_all<R>(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    response: &mut Response,
    kind: &str,
    requests: &[R],
    handler: Handler<R>,
) {
    for request in requests {
        if let Err(e) = handler(ctx, state, request, response) {
            record_error(ctx.addr, response, kind, &e);
        }
    }
}

/// Adds the failure to the response error list.
pub fn record_error(addr: SocketAddr, response: &mut Response, kind: &str, err: &RequestError) {
    match err {
        RequestError::Internal(detail) => {
            error!("Router: {}: {} request failed: {}", addr, kind, detail)
        }
        _ => warn!("Router: {}: {} request failed: {}", addr, kind, err),
    }
    response
        .error
        .push(format!("Unable to handle {} request: {}", kind, err));
}

/// Handles all sub-requests of the line. Requests of unauthenticated clients
/// other than login are ignored and answered with `logon`.
pub fn handle(ctx: &mut RequestContext<'_>, state: &mut WorldState, request: &Request) -> Response {
    let mut response = Response::default();
    handle_all(ctx, state, &mut response, "login", &request.login, login::handle_login);
    if ctx.user().is_err() {
        response.logon = true;
        return response;
    }
    handle_all(ctx, state, &mut response, "new character", &request.new_char, character::handle_new_char);
    handle_all(ctx, state, &mut response, "set position", &request.set_pos, character::handle_set_pos);
    handle_all(ctx, state, &mut response, "move", &request.move_to, character::handle_move);
    handle_all(ctx, state, &mut response, "dialog", &request.dialog, dialog::handle_dialog);
    handle_all(ctx, state, &mut response, "dialog answer", &request.dialog_answer, dialog::handle_dialog_answer);
    handle_all(ctx, state, &mut response, "dialog end", &request.dialog_end, dialog::handle_dialog_end);
    handle_all(ctx, state, &mut response, "trade", &request.trade, items::handle_trade);
    handle_all(ctx, state, &mut response, "transfer items", &request.transfer_items, items::handle_transfer_items);
    handle_all(ctx, state, &mut response, "throw items", &request.throw_items, items::handle_throw_items);
    handle_all(ctx, state, &mut response, "use", &request.use_object, items::handle_use);
    handle_all(ctx, state, &mut response, "equip", &request.equip, items::handle_equip);
    handle_all(ctx, state, &mut response, "unequip", &request.unequip, items::handle_unequip);
    handle_all(ctx, state, &mut response, "training", &request.training, character::handle_training);
    handle_all(ctx, state, &mut response, "chat", &request.chat, character::handle_chat);
    handle_all(ctx, state, &mut response, "target", &request.target, character::handle_target);
    handle_all(ctx, state, &mut response, "save", &request.save, admin::handle_save);
    handle_all(ctx, state, &mut response, "load", &request.load, admin::handle_load);
    handle_all(ctx, state, &mut response, "command", &request.command, admin::handle_command);
    handle_all(ctx, state, &mut response, "accept", &request.accept, items::handle_accept);
    handle_all(ctx, state, &mut response, "reject", &request.reject, items::handle_reject);
    if let Some(paused) = request.pause {
        handle_all(ctx, state, &mut response, "pause", &[paused], admin::handle_pause);
    }
    if let Some(deadline) = request.close {
        handle_all(ctx, state, &mut response, "close", &[deadline], admin::handle_close);
    }
    response
}

/// Resolves the object or fails with a not found error naming its role.
pub fn object<'s>(
    state: &'s WorldState,
    what: &str,
    id: &str,
    serial: &str,
) -> Result<&'s WorldObject, RequestError> {
    state
        .object(id, serial)
        .ok_or_else(|| RequestError::not_found(what, id, serial))
}

/// Checks if both objects are close enough to interact. Objects without
/// position are always in range.
pub fn in_range(a: &WorldObject, b: &WorldObject, range: f64) -> bool {
    match (a.as_positioned(), b.as_positioned()) {
        (Some(a), Some(b)) => a.position().distance(&b.position()) <= range,
        _ => true,
    }
}

/// Moves the listed items between two containers, one by one.
///
/// Stops at the first item missing in the source. Items moved before that
/// stay moved. Moved items are unequipped from the source.
pub fn transfer_items(
    state: &mut WorldState,
    from: &ObjectKey,
    to: &ObjectKey,
    items: &ItemList,
) -> Result<(), RequestError> {
    if state
        .object(&to.id, &to.serial)
        .and_then(WorldObject::as_container)
        .is_none()
    {
        return Err(RequestError::capability("a container", &to.id, &to.serial));
    }
    for (id, serials) in items {
        for serial in serials {
            let source = state
                .object_mut(&from.id, &from.serial)
                .ok_or_else(|| RequestError::not_found("Object", &from.id, &from.serial))?;
            if let Some(character) = source.as_character_mut() {
                character.equipment.unequip(&ObjectKey::new(id, serial));
            }
            let item = source
                .as_container_mut()
                .and_then(|c| c.inventory_mut().take(id, serial))
                .ok_or_else(|| RequestError::item_not_found(id, serial))?;
            let target = state
                .object_mut(&to.id, &to.serial)
                .and_then(WorldObject::as_container_mut)
                .ok_or_else(|| RequestError::Internal(format!("container vanished: {}", to)))?;
            target.inventory_mut().add(item);
        }
    }
    Ok(())
}
