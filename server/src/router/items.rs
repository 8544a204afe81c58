//! Item requests: trades, transfers, use and equipment.

use log::info;
use shared::request::{Equip, ThrowItems, Trade, TransferItems, Unequip, Use};
use shared::{response, EffectData, Response};

use super::{in_range, object, transfer_items, RequestContext};
use crate::confirm::PendingConfirmation;
use crate::error::RequestError;
use crate::hub::HubEvent;
use crate::world::{ObjectKey, WorldObject, WorldState};

/// Proposes a trade to the seller. Inventories stay untouched until the
/// seller's controller accepts.
pub fn handle_trade(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Trade,
    response: &mut Response,
) -> Result<(), RequestError> {
    let (buyer_id, buyer_serial) = req.buyer();
    let (seller_id, seller_serial) = req.seller();
    ctx.check_controls(buyer_id, buyer_serial)?;
    if !req.parties_match() {
        return Err(RequestError::CapabilityMismatch(
            "trade sections name different parties".to_string(),
        ));
    }
    let seller = object(state, "Seller", seller_id, seller_serial)?;
    if seller.as_character().is_none() {
        return Err(RequestError::capability("a character", seller_id, seller_serial));
    }
    let buyer = object(state, "Buyer", buyer_id, buyer_serial)?;
    if buyer.as_character().is_none() {
        return Err(RequestError::capability("a character", buyer_id, buyer_serial));
    }
    if !in_range(buyer, seller, ctx.config.action_min_range) {
        return Err(RequestError::Range);
    }
    let confirmation = PendingConfirmation::new(ctx.confirmation_ids.next(), ctx.addr, req.clone());
    let view = confirmation.view();
    let seller_key = confirmation.target.clone();
    info!(
        "Router: {}: trade proposed: {}: buyer: {} {}, seller: {}",
        ctx.addr, confirmation.id, buyer_id, buyer_serial, seller_key
    );
    ctx.emit(HubEvent::ConfirmationRegistered(confirmation));
    ctx.emit(HubEvent::CharacterDirectedResponse {
        character: seller_key,
        response: Response {
            trade: vec![view.clone()],
            ..Default::default()
        },
    });
    response.trade.push(view);
    Ok(())
}

pub fn handle_accept(
    ctx: &mut RequestContext<'_>,
    _state: &mut WorldState,
    id: &u64,
    _response: &mut Response,
) -> Result<(), RequestError> {
    ctx.emit(HubEvent::ConfirmationResolved {
        id: *id,
        resolver: Some(ctx.addr),
        accepted: true,
    });
    Ok(())
}

pub fn handle_reject(
    ctx: &mut RequestContext<'_>,
    _state: &mut WorldState,
    id: &u64,
    _response: &mut Response,
) -> Result<(), RequestError> {
    ctx.emit(HubEvent::ConfirmationResolved {
        id: *id,
        resolver: Some(ctx.addr),
        accepted: false,
    });
    Ok(())
}

/// Moves items into a controlled container. Items may be taken from
/// controlled characters, dead characters and area containers.
pub fn handle_transfer_items(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &TransferItems,
    _response: &mut Response,
) -> Result<(), RequestError> {
    let to = object(state, "Object 'to'", &req.object_to_id, &req.object_to_serial)?;
    if to.as_container().is_none() {
        return Err(RequestError::capability(
            "a container",
            &req.object_to_id,
            &req.object_to_serial,
        ));
    }
    ctx.check_controls(&req.object_to_id, &req.object_to_serial)?;
    let from = object(state, "Object 'from'", &req.object_from_id, &req.object_from_serial)?;
    if from.as_container().is_none() {
        return Err(RequestError::capability(
            "a container",
            &req.object_from_id,
            &req.object_from_serial,
        ));
    }
    if !in_range(from, to, ctx.config.action_min_range) {
        return Err(RequestError::Range);
    }
    if let Some(character) = from.as_character() {
        if character.live() && !ctx.user()?.controls(&req.object_from_id, &req.object_from_serial)
        {
            return Err(RequestError::permission(
                &req.object_from_id,
                &req.object_from_serial,
            ));
        }
    }
    transfer_items(
        state,
        &ObjectKey::new(&req.object_from_id, &req.object_from_serial),
        &ObjectKey::new(&req.object_to_id, &req.object_to_serial),
        &req.items,
    )
}

/// Removes items from a controlled container. Stops at the first missing
/// item.
pub fn handle_throw_items(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &ThrowItems,
    _response: &mut Response,
) -> Result<(), RequestError> {
    object(state, "Object", &req.object_id, &req.object_serial)?;
    ctx.check_controls(&req.object_id, &req.object_serial)?;
    let holder = state
        .object_mut(&req.object_id, &req.object_serial)
        .ok_or_else(|| RequestError::not_found("Object", &req.object_id, &req.object_serial))?;
    if holder.as_container().is_none() {
        return Err(RequestError::capability("a container", &req.object_id, &req.object_serial));
    }
    for (id, serials) in &req.items {
        for serial in serials {
            if let Some(character) = holder.as_character_mut() {
                character.equipment.unequip(&ObjectKey::new(id, serial));
            }
            holder
                .as_container_mut()
                .and_then(|c| c.inventory_mut().take(id, serial))
                .ok_or_else(|| RequestError::item_not_found(id, serial))?;
        }
    }
    Ok(())
}

/// What a use request resolved to.
enum UseKind {
    Skill { effect: EffectData, range: f64 },
    Item { effect: EffectData, consumable: bool },
    Object { effect: EffectData },
}

fn resolve_usable(
    ctx: &RequestContext<'_>,
    state: &WorldState,
    req: &Use,
) -> Result<UseKind, RequestError> {
    let user = object(state, "User", &req.user_id, &req.user_serial)?;
    let character = user
        .as_character()
        .ok_or_else(|| RequestError::capability("a character", &req.user_id, &req.user_serial))?;
    if let Some(skill) = character.skills.iter().find(|s| s.id == req.object_id) {
        if !skill.ready() {
            return Err(RequestError::CapabilityMismatch(format!(
                "skill not ready: {}",
                skill.id
            )));
        }
        return Ok(UseKind::Skill {
            effect: skill.effect,
            range: skill.range,
        });
    }
    if let Some(item) = character.inventory.item(&req.object_id, &req.object_serial) {
        let effect = item.effect.ok_or_else(|| {
            RequestError::capability("usable", &req.object_id, &req.object_serial)
        })?;
        return Ok(UseKind::Item {
            effect,
            consumable: item.consumable,
        });
    }
    let target = object(state, "Object", &req.object_id, &req.object_serial)?;
    let effect = target
        .as_usable()
        .and_then(|u| u.use_effect())
        .ok_or_else(|| RequestError::capability("usable", &req.object_id, &req.object_serial))?;
    if !in_range(user, target, ctx.config.action_min_range) {
        return Err(RequestError::Range);
    }
    Ok(UseKind::Object { effect })
}

/// Uses a skill, an owned item or an area object in range. Skills act on
/// the user's target, or on the user if it has none.
pub fn handle_use(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Use,
    response: &mut Response,
) -> Result<(), RequestError> {
    ctx.check_controls(&req.user_id, &req.user_serial)?;
    let usable = resolve_usable(ctx, state, req)?;
    let user_key = ObjectKey::new(&req.user_id, &req.user_serial);
    match usable {
        UseKind::Skill { effect, range } => {
            let target_key = state
                .character(&req.user_id, &req.user_serial)
                .and_then(|c| c.target.clone())
                .unwrap_or_else(|| user_key.clone());
            if target_key != user_key {
                let user = object(state, "User", &user_key.id, &user_key.serial)?;
                let target = object(state, "Target", &target_key.id, &target_key.serial)?;
                if target.as_character().is_none() {
                    return Err(RequestError::capability(
                        "a character",
                        &target_key.id,
                        &target_key.serial,
                    ));
                }
                if !in_range(user, target, range) {
                    return Err(RequestError::Range);
                }
            }
            if let Some(target) = state.character_mut(&target_key.id, &target_key.serial) {
                target.apply_effect(&effect);
            }
            if let Some(skill) = state
                .character_mut(&req.user_id, &req.user_serial)
                .and_then(|c| c.skill_mut(&req.object_id))
            {
                skill.cooldown_left = skill.cooldown;
            }
        }
        UseKind::Item { effect, consumable } => {
            let character = state
                .character_mut(&req.user_id, &req.user_serial)
                .ok_or_else(|| RequestError::not_found("User", &req.user_id, &req.user_serial))?;
            character.apply_effect(&effect);
            if consumable {
                character
                    .equipment
                    .unequip(&ObjectKey::new(&req.object_id, &req.object_serial));
                character.inventory.take(&req.object_id, &req.object_serial);
            }
        }
        UseKind::Object { effect } => {
            let character = state
                .character_mut(&req.user_id, &req.user_serial)
                .ok_or_else(|| RequestError::not_found("User", &req.user_id, &req.user_serial))?;
            character.apply_effect(&effect);
        }
    }
    let used = response::Use {
        object_id: req.object_id.clone(),
        object_serial: req.object_serial.clone(),
        user_id: req.user_id.clone(),
        user_serial: req.user_serial.clone(),
    };
    if let Some(user) = state.object(&req.user_id, &req.user_serial) {
        if let Some(position) = user.as_positioned().map(|p| p.position()) {
            for witness in state.near(user.area_id(), &position, ctx.config.sight_range) {
                if witness == user_key {
                    continue;
                }
                ctx.emit(HubEvent::CharacterDirectedResponse {
                    character: witness,
                    response: Response {
                        use_object: vec![used.clone()],
                        ..Default::default()
                    },
                });
            }
        }
    }
    response.use_object.push(used);
    Ok(())
}

fn controlled_character<'s>(
    ctx: &RequestContext<'_>,
    state: &'s mut WorldState,
    id: &str,
    serial: &str,
) -> Result<&'s mut crate::world::Character, RequestError> {
    object(state, "Character", id, serial)?;
    ctx.check_controls(id, serial)?;
    state
        .object_mut(id, serial)
        .and_then(WorldObject::as_character_mut)
        .ok_or_else(|| RequestError::capability("a character", id, serial))
}

pub fn handle_equip(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Equip,
    _response: &mut Response,
) -> Result<(), RequestError> {
    let character = controlled_character(ctx, state, &req.char_id, &req.char_serial)?;
    let item = character
        .inventory
        .item(&req.item_id, &req.item_serial)
        .cloned()
        .ok_or_else(|| RequestError::item_not_found(&req.item_id, &req.item_serial))?;
    let slots: Vec<(String, u32)> = req
        .slots
        .iter()
        .map(|s| (s.slot_type.clone(), s.id))
        .collect();
    character
        .equipment
        .equip(&item, &slots)
        .map_err(|e| RequestError::EquipSlot(e.to_string()))
}

pub fn handle_unequip(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Unequip,
    _response: &mut Response,
) -> Result<(), RequestError> {
    let character = controlled_character(ctx, state, &req.char_id, &req.char_serial)?;
    let item = character
        .inventory
        .item(&req.item_id, &req.item_serial)
        .map(|i| i.key())
        .ok_or_else(|| RequestError::item_not_found(&req.item_id, &req.item_serial))?;
    if !character.equipment.unequip(&item) {
        return Err(RequestError::EquipSlot(format!("item not equipped: {}", item)));
    }
    Ok(())
}
