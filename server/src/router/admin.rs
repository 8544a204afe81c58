//! Admin requests. All of them require an admin user.

use std::path::PathBuf;

use log::info;
use shared::{response, Response};

use super::RequestContext;
use crate::command;
use crate::error::RequestError;
use crate::hub::HubEvent;
use crate::utils::get_timestamp_nanos;
use crate::world::{load_module, save_module, ObjectKey, WorldState};

fn save_path(ctx: &RequestContext<'_>, name: &str) -> Result<PathBuf, RequestError> {
    ctx.config
        .save_path(name)
        .ok_or_else(|| RequestError::InvalidArgument(format!("invalid save name: {}", name)))
}

/// Exports the world into the named save file.
pub fn handle_save(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    name: &String,
    _response: &mut Response,
) -> Result<(), RequestError> {
    ctx.check_admin()?;
    let path = save_path(ctx, name)?;
    save_module(&path, &state.export()).map_err(|e| RequestError::Internal(e.to_string()))?;
    info!("Router: {}: world saved: {}", ctx.addr, path.display());
    Ok(())
}

/// Loads the named save file. The world itself is swapped by the hub.
pub fn handle_load(
    ctx: &mut RequestContext<'_>,
    _state: &mut WorldState,
    name: &String,
    _response: &mut Response,
) -> Result<(), RequestError> {
    ctx.check_admin()?;
    let path = save_path(ctx, name)?;
    let module = load_module(&path).map_err(|e| RequestError::Internal(e.to_string()))?;
    info!("Router: {}: world load requested: {}", ctx.addr, path.display());
    ctx.emit(HubEvent::WorldReload(module));
    Ok(())
}

/// Runs a command line. Chapter switches carry all characters of the user.
pub fn handle_command(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    line: &String,
    response: &mut Response,
) -> Result<(), RequestError> {
    ctx.check_admin()?;
    let carried: Vec<ObjectKey> = ctx
        .user()?
        .chars()
        .iter()
        .map(|c| ObjectKey::new(&c.id, &c.serial))
        .collect();
    let (result, out) = command::execute(state, line, &carried);
    response.command.push(response::Command { result, out });
    Ok(())
}

pub fn handle_pause(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    paused: &bool,
    _response: &mut Response,
) -> Result<(), RequestError> {
    ctx.check_admin()?;
    state.set_paused(*paused);
    info!("Router: {}: world paused: {}", ctx.addr, paused);
    Ok(())
}

/// Schedules the server shutdown at the deadline, in nanoseconds since the
/// UNIX epoch. The deadline must lie in the future.
pub fn handle_close(
    ctx: &mut RequestContext<'_>,
    _state: &mut WorldState,
    deadline: &i64,
    _response: &mut Response,
) -> Result<(), RequestError> {
    ctx.check_admin()?;
    if *deadline <= get_timestamp_nanos() {
        return Err(RequestError::InvalidArgument(format!(
            "close deadline already passed: {}",
            deadline
        )));
    }
    ctx.emit(HubEvent::ShutdownScheduled {
        deadline_nanos: *deadline,
    });
    Ok(())
}
