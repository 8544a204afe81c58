//! World objects and their capabilities.
//!
//! Request handlers never branch on concrete object types. They ask a
//! [`WorldObject`] for a capability view (`as_positioned`, `as_container`,
//! `as_talker`, `as_usable`) and treat `None` as "object lacks capability".

use shared::{AttributesData, CharacterData, EffectData, ObjectData, SkillData, TrainingData};

use super::dialog::Dialog;
use super::inventory::{Equipment, Inventory};
use super::position::Position;
use super::ObjectKey;

/// Character flag set while the owning user is logged out.
pub const INACTIVE_FLAG: &str = "inactive";

pub trait Positioned {
    fn position(&self) -> Position;
    fn set_position(&mut self, position: Position);
}

pub trait Container {
    fn inventory(&self) -> &Inventory;
    fn inventory_mut(&mut self) -> &mut Inventory;
}

pub trait Talker {
    fn dialogs(&self) -> &[Dialog];
    fn dialogs_mut(&mut self) -> &mut [Dialog];

    fn dialog_mut(&mut self, id: &str) -> Option<&mut Dialog> {
        self.dialogs_mut().iter_mut().find(|d| d.id() == id)
    }
}

pub trait Usable {
    /// Effect applied to the user of this object.
    fn use_effect(&self) -> Option<EffectData>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub id: String,
    pub effect: EffectData,
    pub range: f64,
    pub cooldown: i64,
    pub cooldown_left: i64,
}

impl Skill {
    fn from_data(data: &SkillData) -> Self {
        Self {
            id: data.id.clone(),
            effect: data.effect,
            range: data.range,
            cooldown: data.cooldown,
            cooldown_left: data.cooldown_left,
        }
    }

    fn to_data(&self) -> SkillData {
        SkillData {
            id: self.id.clone(),
            effect: self.effect,
            range: self.range,
            cooldown: self.cooldown,
            cooldown_left: self.cooldown_left,
        }
    }

    pub fn ready(&self) -> bool {
        self.cooldown_left <= 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub id: String,
    pub serial: String,
    pub name: String,
    pub area_id: String,
    pub level: u32,
    pub health: i64,
    pub max_health: i64,
    pub attributes: AttributesData,
    pub position: Position,
    pub destination: Position,
    pub flags: Vec<String>,
    pub inventory: Inventory,
    pub equipment: Equipment,
    pub dialogs: Vec<Dialog>,
    pub skills: Vec<Skill>,
    pub trainings: Vec<TrainingData>,
    pub target: Option<ObjectKey>,
}

impl Character {
    pub fn from_data(data: &CharacterData, area_id: &str) -> Self {
        let position = Position::new(data.pos_x, data.pos_y);
        let destination = if data.dest_x == 0.0 && data.dest_y == 0.0 {
            position
        } else {
            Position::new(data.dest_x, data.dest_y)
        };
        let max_health = data.max_health.max(data.health);
        Self {
            id: data.id.clone(),
            serial: data.serial.clone(),
            name: data.name.clone(),
            area_id: area_id.to_string(),
            level: data.level,
            health: data.health,
            max_health,
            attributes: data.attributes,
            position,
            destination,
            flags: data.flags.clone(),
            inventory: Inventory::from_data(&data.inventory),
            equipment: Equipment::from_data(&data.equipment),
            dialogs: data.dialogs.iter().map(Dialog::from_data).collect(),
            skills: data.skills.iter().map(Skill::from_data).collect(),
            trainings: data.trainings.clone(),
            target: (!data.target_id.is_empty())
                .then(|| ObjectKey::new(&data.target_id, &data.target_serial)),
        }
    }

    pub fn to_data(&self) -> CharacterData {
        CharacterData {
            id: self.id.clone(),
            serial: self.serial.clone(),
            name: self.name.clone(),
            level: self.level,
            health: self.health,
            max_health: self.max_health,
            attributes: self.attributes,
            pos_x: self.position.x,
            pos_y: self.position.y,
            dest_x: self.destination.x,
            dest_y: self.destination.y,
            flags: self.flags.clone(),
            inventory: self.inventory.to_data(),
            equipment: self.equipment.to_data(),
            dialogs: self.dialogs.iter().map(Dialog::to_data).collect(),
            skills: self.skills.iter().map(Skill::to_data).collect(),
            trainings: self.trainings.clone(),
            target_id: self.target.as_ref().map(|t| t.id.clone()).unwrap_or_default(),
            target_serial: self
                .target
                .as_ref()
                .map(|t| t.serial.clone())
                .unwrap_or_default(),
        }
    }

    pub fn live(&self) -> bool {
        self.health > 0
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn add_flag(&mut self, flag: &str) {
        if !self.has_flag(flag) {
            self.flags.push(flag.to_string());
        }
    }

    pub fn remove_flag(&mut self, flag: &str) {
        self.flags.retain(|f| f != flag);
    }

    pub fn skill_mut(&mut self, id: &str) -> Option<&mut Skill> {
        self.skills.iter_mut().find(|s| s.id == id)
    }

    pub fn apply_effect(&mut self, effect: &EffectData) {
        self.health = (self.health + effect.health).clamp(0, self.max_health);
    }

    /// Raises the named attribute. Returns false for unknown attributes.
    pub fn train(&mut self, attribute: &str, value: u32) -> bool {
        let target = match attribute {
            "str" => &mut self.attributes.str,
            "con" => &mut self.attributes.con,
            "dex" => &mut self.attributes.dex,
            "int" => &mut self.attributes.int,
            "wis" => &mut self.attributes.wis,
            _ => return false,
        };
        *target += value;
        true
    }

    /// Advances movement and cooldowns by the specified delta.
    fn update(&mut self, delta_ms: i64, speed: f64) {
        for skill in self.skills.iter_mut() {
            skill.cooldown_left = (skill.cooldown_left - delta_ms).max(0);
        }
        if !self.live() || self.has_flag(INACTIVE_FLAG) {
            return;
        }
        let step = speed * delta_ms as f64 / 1000.0;
        self.position = self.position.step_toward(&self.destination, step);
    }
}

impl Positioned for Character {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
        self.destination = position;
    }
}

impl Container for Character {
    fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }
}

impl Talker for Character {
    fn dialogs(&self) -> &[Dialog] {
        &self.dialogs
    }

    fn dialogs_mut(&mut self) -> &mut [Dialog] {
        &mut self.dialogs
    }
}

/// Static area object: chests, shrines, corpses.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaObject {
    pub id: String,
    pub serial: String,
    pub name: String,
    pub area_id: String,
    pub position: Position,
    pub inventory: Inventory,
    pub effect: Option<EffectData>,
}

impl AreaObject {
    pub fn from_data(data: &ObjectData, area_id: &str) -> Self {
        Self {
            id: data.id.clone(),
            serial: data.serial.clone(),
            name: data.name.clone(),
            area_id: area_id.to_string(),
            position: Position::new(data.pos_x, data.pos_y),
            inventory: Inventory::from_data(&data.inventory),
            effect: data.effect,
        }
    }

    pub fn to_data(&self) -> ObjectData {
        ObjectData {
            id: self.id.clone(),
            serial: self.serial.clone(),
            name: self.name.clone(),
            pos_x: self.position.x,
            pos_y: self.position.y,
            inventory: self.inventory.to_data(),
            effect: self.effect,
        }
    }
}

impl Positioned for AreaObject {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl Container for AreaObject {
    fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }
}

impl Usable for AreaObject {
    fn use_effect(&self) -> Option<EffectData> {
        self.effect
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldObject {
    Character(Character),
    Area(AreaObject),
}

impl WorldObject {
    pub fn id(&self) -> &str {
        match self {
            WorldObject::Character(c) => &c.id,
            WorldObject::Area(o) => &o.id,
        }
    }

    pub fn serial(&self) -> &str {
        match self {
            WorldObject::Character(c) => &c.serial,
            WorldObject::Area(o) => &o.serial,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.id(), self.serial())
    }

    pub fn area_id(&self) -> &str {
        match self {
            WorldObject::Character(c) => &c.area_id,
            WorldObject::Area(o) => &o.area_id,
        }
    }

    pub(super) fn set_area(&mut self, area_id: &str) {
        match self {
            WorldObject::Character(c) => c.area_id = area_id.to_string(),
            WorldObject::Area(o) => o.area_id = area_id.to_string(),
        }
    }

    pub(super) fn update(&mut self, delta_ms: i64, speed: f64) {
        if let WorldObject::Character(c) = self {
            c.update(delta_ms, speed);
        }
    }

    pub fn as_character(&self) -> Option<&Character> {
        match self {
            WorldObject::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_character_mut(&mut self) -> Option<&mut Character> {
        match self {
            WorldObject::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_positioned(&self) -> Option<&dyn Positioned> {
        match self {
            WorldObject::Character(c) => Some(c),
            WorldObject::Area(o) => Some(o),
        }
    }

    pub fn as_positioned_mut(&mut self) -> Option<&mut dyn Positioned> {
        match self {
            WorldObject::Character(c) => Some(c),
            WorldObject::Area(o) => Some(o),
        }
    }

    pub fn as_container(&self) -> Option<&dyn Container> {
        match self {
            WorldObject::Character(c) => Some(c),
            WorldObject::Area(o) => Some(o),
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut dyn Container> {
        match self {
            WorldObject::Character(c) => Some(c),
            WorldObject::Area(o) => Some(o),
        }
    }

    pub fn as_talker(&self) -> Option<&dyn Talker> {
        match self {
            WorldObject::Character(c) => Some(c),
            WorldObject::Area(_) => None,
        }
    }

    pub fn as_talker_mut(&mut self) -> Option<&mut dyn Talker> {
        match self {
            WorldObject::Character(c) => Some(c),
            WorldObject::Area(_) => None,
        }
    }

    pub fn as_usable(&self) -> Option<&dyn Usable> {
        match self {
            WorldObject::Character(_) => None,
            WorldObject::Area(o) => Some(o),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn character() -> Character {
        Character::from_data(
            &CharacterData {
                id: "hero".to_string(),
                serial: "0".to_string(),
                health: 50,
                max_health: 100,
                pos_x: 0.0,
                pos_y: 0.0,
                skills: vec![SkillData {
                    id: "heal".to_string(),
                    cooldown: 2000,
                    cooldown_left: 1500,
                    ..Default::default()
                }],
                ..Default::default()
            },
            "area1",
        )
    }

    #[test]
    fn test_capabilities() {
        let hero = WorldObject::Character(character());
        assert!(hero.as_positioned().is_some());
        assert!(hero.as_container().is_some());
        assert!(hero.as_talker().is_some());
        assert!(hero.as_usable().is_none());

        let chest = WorldObject::Area(AreaObject::from_data(
            &ObjectData {
                id: "chest".to_string(),
                ..Default::default()
            },
            "area1",
        ));
        assert!(chest.as_positioned().is_some());
        assert!(chest.as_container().is_some());
        assert!(chest.as_talker().is_none());
        assert!(chest.as_character().is_none());
        assert!(chest.as_usable().unwrap().use_effect().is_none());
    }

    #[test]
    fn test_update_moves_toward_destination() {
        let mut hero = character();
        hero.destination = Position::new(100.0, 0.0);

        hero.update(500, 100.0);
        assert_approx_eq!(hero.position.x, 50.0, 1e-9);
        assert_eq!(hero.skills[0].cooldown_left, 1000);

        hero.update(1000, 100.0);
        assert_eq!(hero.position, hero.destination);
    }

    #[test]
    fn test_inactive_character_does_not_move() {
        let mut hero = character();
        hero.add_flag(INACTIVE_FLAG);
        hero.destination = Position::new(100.0, 0.0);

        hero.update(1000, 100.0);
        assert_eq!(hero.position, Position::new(0.0, 0.0));
    }

    #[test]
    fn test_apply_effect_clamps_health() {
        let mut hero = character();
        hero.apply_effect(&EffectData { health: 80 });
        assert_eq!(hero.health, 100);
        hero.apply_effect(&EffectData { health: -500 });
        assert_eq!(hero.health, 0);
        assert!(!hero.live());
    }

    #[test]
    fn test_train() {
        let mut hero = character();
        assert!(hero.train("str", 2));
        assert_eq!(hero.attributes.str, 2);
        assert!(!hero.train("luck", 1));
    }

    #[test]
    fn test_set_position_stops_movement() {
        let mut hero = character();
        hero.destination = Position::new(10.0, 10.0);
        Positioned::set_position(&mut hero, Position::new(3.0, 4.0));
        assert_eq!(hero.destination, Position::new(3.0, 4.0));
    }

    #[test]
    fn test_data_conversion() {
        let hero = character();
        let restored = Character::from_data(&hero.to_data(), "area1");
        assert_eq!(restored, hero);
    }
}
