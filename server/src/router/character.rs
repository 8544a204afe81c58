//! Character requests: creation, movement, targeting, chat and training.

use log::info;
use shared::request::{Chat, Move, SetPos, Target, Training};
use shared::{response, CharacterData, Response};

use super::{in_range, object, RequestContext};
use crate::error::{RequestError, WorldError};
use crate::hub::HubEvent;
use crate::utils::get_timestamp;
use crate::world::{ObjectKey, Position, WorldState};

pub fn handle_new_char(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    data: &CharacterData,
    response: &mut Response,
) -> Result<(), RequestError> {
    ctx.user()?;
    let key = state.spawn_character(data).map_err(|e| match e {
        WorldError::InvalidCharacter(id) => RequestError::CapabilityMismatch(format!(
            "character does not fit chapter start rules: {}",
            id
        )),
        other => RequestError::Internal(format!("unable to spawn character: {}", other)),
    })?;
    ctx.user_mut()?.add_char(&key.id, &key.serial);
    if let Some(character) = state.character(&key.id, &key.serial) {
        response.new_char.push(character.to_data());
    }
    info!("Router: {}: character spawned: {}", ctx.addr, key);
    Ok(())
}

/// Instantly repositions an object.
pub fn handle_set_pos(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &SetPos,
    _response: &mut Response,
) -> Result<(), RequestError> {
    ctx.check_admin()?;
    let positioned = state
        .object_mut(&req.id, &req.serial)
        .ok_or_else(|| RequestError::not_found("Object", &req.id, &req.serial))?
        .as_positioned_mut()
        .ok_or_else(|| RequestError::capability("positioned", &req.id, &req.serial))?;
    positioned.set_position(Position::new(req.pos_x, req.pos_y));
    Ok(())
}

/// Sets the destination of a controlled character. Movement is not range
/// checked.
pub fn handle_move(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Move,
    _response: &mut Response,
) -> Result<(), RequestError> {
    object(state, "Object", &req.id, &req.serial)?;
    ctx.check_controls(&req.id, &req.serial)?;
    let character = state
        .character_mut(&req.id, &req.serial)
        .ok_or_else(|| RequestError::capability("movable", &req.id, &req.serial))?;
    character.destination = Position::new(req.pos_x, req.pos_y);
    Ok(())
}

/// Sets or clears the target of a controlled character.
pub fn handle_target(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Target,
    _response: &mut Response,
) -> Result<(), RequestError> {
    object(state, "Object", &req.object_id, &req.object_serial)?;
    ctx.check_controls(&req.object_id, &req.object_serial)?;
    let target = if req.target_id.is_empty() {
        None
    } else {
        object(state, "Target", &req.target_id, &req.target_serial)?;
        Some(ObjectKey::new(&req.target_id, &req.target_serial))
    };
    let character = state
        .character_mut(&req.object_id, &req.object_serial)
        .ok_or_else(|| RequestError::capability("a character", &req.object_id, &req.object_serial))?;
    character.target = target;
    Ok(())
}

/// Sends the message to the controllers of all objects in sight of the
/// speaker.
pub fn handle_chat(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Chat,
    _response: &mut Response,
) -> Result<(), RequestError> {
    let speaker = object(state, "Object", &req.object_id, &req.object_serial)?;
    ctx.check_controls(&req.object_id, &req.object_serial)?;
    let position = speaker
        .as_positioned()
        .ok_or_else(|| RequestError::capability("positioned", &req.object_id, &req.object_serial))?
        .position();
    let chat = response::Chat {
        object_id: req.object_id.clone(),
        object_serial: req.object_serial.clone(),
        message: req.message.clone(),
        translated: req.translated,
        time: get_timestamp(),
    };
    for listener in state.near(speaker.area_id(), &position, ctx.config.sight_range) {
        ctx.emit(HubEvent::CharacterDirectedResponse {
            character: listener,
            response: Response {
                chat: vec![chat.clone()],
                ..Default::default()
            },
        });
    }
    Ok(())
}

/// Trains a controlled character at a trainer in range.
pub fn handle_training(
    ctx: &mut RequestContext<'_>,
    state: &mut WorldState,
    req: &Training,
    _response: &mut Response,
) -> Result<(), RequestError> {
    let user = object(state, "User", &req.user_id, &req.user_serial)?;
    ctx.check_controls(&req.user_id, &req.user_serial)?;
    let trainer = object(state, "Trainer", &req.trainer_id, &req.trainer_serial)?;
    let training = trainer
        .as_character()
        .ok_or_else(|| {
            RequestError::capability("a trainer", &req.trainer_id, &req.trainer_serial)
        })?
        .trainings
        .iter()
        .find(|t| t.id == req.training_id)
        .cloned()
        .ok_or_else(|| RequestError::NotFound(format!("training not found: {}", req.training_id)))?;
    if !in_range(user, trainer, ctx.config.action_min_range) {
        return Err(RequestError::Range);
    }
    let character = state
        .character_mut(&req.user_id, &req.user_serial)
        .ok_or_else(|| RequestError::capability("a character", &req.user_id, &req.user_serial))?;
    if !character.train(&training.attribute, training.value) {
        return Err(RequestError::Internal(format!(
            "training {} raises unknown attribute: {}",
            training.id, training.attribute
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::hub::HubEvent;
    use crate::router::testing::*;
    use crate::world::{ObjectKey, Position};

    #[test]
    fn test_move() {
        let mut fixture = Fixture::logged("alice");
        let response =
            fixture.handle_line(r#"{"move":[{"id":"hero","serial":"0","pos-x":5,"pos-y":5}]}"#);

        assert!(response.error.is_empty());
        let hero = fixture.state.character("hero", "0").unwrap();
        assert_eq!(hero.destination, Position::new(5.0, 5.0));
    }

    #[test]
    fn test_move_is_not_range_checked() {
        let mut fixture = Fixture::logged("alice");
        let response = fixture
            .handle_line(r#"{"move":[{"id":"hero","serial":"0","pos-x":9000,"pos-y":0}]}"#);
        assert!(response.error.is_empty());
    }

    #[test]
    fn test_move_errors() {
        let mut fixture = Fixture::logged("alice");
        let response = fixture.handle_line(
            r#"{"move":[{"id":"ghost","serial":"0"},{"id":"far","serial":"4","pos-x":1}]}"#,
        );

        assert_eq!(
            response.error,
            vec![
                "Unable to handle move request: Object not found: ghost 0",
                "Unable to handle move request: object not controlled: far 4",
            ]
        );
        let far = fixture.state.character("far", "4").unwrap();
        assert_eq!(far.destination, far.position);
    }

    #[test]
    fn test_set_pos_requires_admin() {
        let mut fixture = Fixture::logged("alice");
        let line = r#"{"set-pos":[{"id":"hero","serial":"0","pos-x":7,"pos-y":7}]}"#;
        let response = fixture.handle_line(line);
        assert_eq!(
            response.error,
            vec!["Unable to handle set position request: admin privileges required"]
        );

        let mut fixture = Fixture::logged("root");
        let response = fixture.handle_line(line);
        assert!(response.error.is_empty());
        let hero = fixture.state.character("hero", "0").unwrap();
        assert_eq!(hero.position, Position::new(7.0, 7.0));
    }

    #[test]
    fn test_new_char() {
        let mut fixture = Fixture::logged("alice");
        let response = fixture.handle_line(
            r#"{"new-char":[{"id":"rookie","level":1,"attributes":{"str":5},"inventory":{"items":[{"id":"stick"}]}}]}"#,
        );

        assert!(response.error.is_empty());
        assert_eq!(response.new_char.len(), 1);
        let spawned = &response.new_char[0];
        assert!(fixture
            .users
            .get("alice")
            .unwrap()
            .controls("rookie", &spawned.serial));
        assert_eq!((spawned.pos_x, spawned.pos_y), (1.0, 1.0));
    }

    #[test]
    fn test_new_char_breaking_start_rules() {
        let mut fixture = Fixture::logged("alice");
        let response = fixture.handle_line(
            r#"{"new-char":[{"id":"cheater","level":1,"attributes":{"str":50}}]}"#,
        );

        assert_eq!(response.error.len(), 1);
        assert!(response.new_char.is_empty());
        assert!(fixture.state.characters().all(|c| c.id != "cheater"));
    }

    #[test]
    fn test_target() {
        let mut fixture = Fixture::logged("alice");
        fixture.handle_line(
            r#"{"target":[{"object-id":"hero","object-serial":"0","target-id":"merchant","target-serial":"2"}]}"#,
        );
        assert_eq!(
            fixture.state.character("hero", "0").unwrap().target,
            Some(ObjectKey::new("merchant", "2"))
        );

        fixture.handle_line(r#"{"target":[{"object-id":"hero","object-serial":"0"}]}"#);
        assert_eq!(fixture.state.character("hero", "0").unwrap().target, None);
    }

    #[test]
    fn test_chat_reaches_objects_in_sight() {
        let mut fixture = Fixture::logged("alice");
        let response = fixture.handle_line(
            r#"{"chat":[{"object-id":"hero","object-serial":"0","message":"hi"}]}"#,
        );

        assert!(response.error.is_empty());
        let listeners: Vec<ObjectKey> = fixture
            .events()
            .into_iter()
            .filter_map(|e| match e {
                HubEvent::CharacterDirectedResponse {
                    character,
                    response,
                } => {
                    assert_eq!(response.chat[0].message, "hi");
                    Some(character)
                }
                _ => None,
            })
            .collect();
        assert!(listeners.contains(&ObjectKey::new("hero", "0")));
        assert!(listeners.contains(&ObjectKey::new("merchant", "2")));
        assert!(!listeners.contains(&ObjectKey::new("far", "4")));
    }

    #[test]
    fn test_chat_from_foreign_character() {
        let mut fixture = Fixture::logged("alice");
        let response = fixture.handle_line(
            r#"{"chat":[{"object-id":"merchant","object-serial":"2","message":"hi"}]}"#,
        );
        assert_eq!(response.error.len(), 1);
        assert!(fixture.events().is_empty());
    }

    #[test]
    fn test_training() {
        let mut fixture = Fixture::logged("alice");
        let response = fixture.handle_line(
            r#"{"training":[{"trainer-id":"trader","trainer-serial":"3","user-id":"hero","user-serial":"0","training-id":"lift"}]}"#,
        );

        assert!(response.error.is_empty());
        assert_eq!(fixture.state.character("hero", "0").unwrap().attributes.str, 2);
    }

    #[test]
    fn test_training_errors() {
        let mut fixture = Fixture::logged("alice");
        fixture
            .state
            .character_mut("hero", "0")
            .unwrap()
            .position = Position::new(300.0, 0.0);
        let response = fixture.handle_line(
            r#"{"training":[
                {"trainer-id":"trader","trainer-serial":"3","user-id":"hero","user-serial":"0","training-id":"lift"},
                {"trainer-id":"trader","trainer-serial":"3","user-id":"hero","user-serial":"0","training-id":"fly"}
            ]}"#,
        );

        assert_eq!(
            response.error,
            vec![
                "Unable to handle training request: objects are not in the minimal range",
                "Unable to handle training request: training not found: fly",
            ]
        );
    }
}
