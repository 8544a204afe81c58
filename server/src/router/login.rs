use log::info;
use shared::request::Login;
use shared::Response;

use super::RequestContext;
use crate::error::RequestError;
use crate::world::WorldState;

/// Binds the user to the session. A user may hold one session at a time.
pub fn handle_login(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    login: &Login,
    _response: &mut Response,
) -> Result<(), RequestError> {
    if ctx.session_user.is_some() {
        return Err(RequestError::Auth("session already logged in".to_string()));
    }
    let user = ctx
        .users
        .get_mut(&login.id)
        .filter(|u| u.pass() == login.pass)
        .ok_or_else(|| RequestError::Auth("invalid ID/password".to_string()))?;
    if user.logged {
        return Err(RequestError::Auth(format!("user already logged: {}", login.id)));
    }
    user.logged = true;
    user.reconcile_chars(state);
    user.set_chars_active(state, true);
    *ctx.session_user = Some(login.id.clone());
    info!("Router: {}: user logged: {}", ctx.addr, login.id);
    Ok(())
}
