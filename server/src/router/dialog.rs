//! Dialog requests.
//!
//! The requester controls the dialog target and talks to the dialog owner.
//! Both must be talkers and stand within the action range.

use shared::request::{Dialog as DialogRequest, DialogAnswer};
use shared::Response;

use super::{in_range, object, RequestContext};
use crate::error::RequestError;
use crate::world::dialog::{Dialog, DialogError};
use crate::world::{ObjectKey, WorldState};

impl From<DialogError> for RequestError {
    fn from(err: DialogError) -> Self {
        match err {
            DialogError::AlreadyStarted(_) | DialogError::NotStarted(_) => {
                RequestError::CapabilityMismatch(err.to_string())
            }
            DialogError::NoStartStage(_)
            | DialogError::NoActiveStage(_)
            | DialogError::AnswerNotFound(_) => RequestError::NotFound(err.to_string()),
        }
    }
}

/// Runs all checks shared by dialog requests and returns the requested
/// dialog of the owner.
fn dialog_mut<'s>(
    ctx: &RequestContext<'_>,
    state: &'s mut WorldState,
    req: &DialogRequest,
) -> Result<&'s mut Dialog, RequestError> {
    ctx.check_controls(&req.target_id, &req.target_serial)?;
    let owner = object(state, "Dialog owner", &req.owner_id, &req.owner_serial)?;
    if owner.as_talker().is_none() {
        return Err(RequestError::capability("a dialog owner", &req.owner_id, &req.owner_serial));
    }
    let target = object(state, "Dialog target", &req.target_id, &req.target_serial)?;
    if target.as_talker().is_none() {
        return Err(RequestError::capability(
            "a dialog target",
            &req.target_id,
            &req.target_serial,
        ));
    }
    if !in_range(owner, target, ctx.config.action_min_range) {
        return Err(RequestError::Range);
    }
    state
        .object_mut(&req.owner_id, &req.owner_serial)
        .and_then(|o| o.as_talker_mut())
        .and_then(|t| t.dialog_mut(&req.dialog_id))
        .ok_or_else(|| RequestError::NotFound(format!("dialog not found: {}", req.dialog_id)))
}

fn check_target(dialog: &Dialog, req: &DialogRequest) -> Result<(), RequestError> {
    let expected = ObjectKey::new(&req.target_id, &req.target_serial);
    match dialog.target() {
        None => Err(DialogError::NotStarted(dialog.id().to_string()).into()),
        Some(target) if *target != expected => Err(RequestError::permission(
            &req.target_id,
            &req.target_serial,
        )),
        Some(_) => Ok(()),
    }
}

pub fn handle_dialog(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &DialogRequest,
    response: &mut Response,
) -> Result<(), RequestError> {
    let dialog = dialog_mut(ctx, state, req)?;
    dialog.start(ObjectKey::new(&req.target_id, &req.target_serial))?;
    response.dialog.push(dialog.state());
    Ok(())
}

pub fn handle_dialog_answer(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &DialogAnswer,
    response: &mut Response,
) -> Result<(), RequestError> {
    let dialog = dialog_mut(ctx, state, &req.dialog)?;
    check_target(dialog, &req.dialog)?;
    dialog.answer(&req.answer_id)?;
    response.dialog.push(dialog.state());
    Ok(())
}

pub fn handle_dialog_end(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &DialogRequest,
    response: &mut Response,
) -> Result<(), RequestError> {
    let dialog = dialog_mut(ctx, state, req)?;
    check_target(dialog, req)?;
    dialog.end();
    response.dialog.push(dialog.state());
    Ok(())
}
