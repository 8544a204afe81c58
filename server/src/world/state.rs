use std::collections::BTreeMap;

use log::info;
use shared::{AreaData, ChapterData, CharacterData, ModuleData};

use super::object::{AreaObject, Character, WorldObject};
use super::position::Position;
use super::ObjectKey;
use crate::error::WorldError;

/// Movement speed of characters in units per second.
pub const MOVE_SPEED: f64 = 100.0;

/// Active chapter settings, without area content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterConf {
    pub id: String,
    pub start_area: String,
    pub start_position: Position,
    pub start_level: u32,
    pub start_attrs: u32,
    pub start_items: Vec<String>,
    pub start_skills: Vec<String>,
}

impl ChapterConf {
    fn from_data(data: &ChapterData) -> Self {
        Self {
            id: data.id.clone(),
            start_area: data.start_area.clone(),
            start_position: Position::new(data.start_pos_x, data.start_pos_y),
            start_level: data.start_level,
            start_attrs: data.start_attrs,
            start_items: data.start_items.clone(),
            start_skills: data.start_skills.clone(),
        }
    }

    fn to_data(&self, areas: Vec<AreaData>) -> ChapterData {
        ChapterData {
            id: self.id.clone(),
            start_area: self.start_area.clone(),
            start_pos_x: self.start_position.x,
            start_pos_y: self.start_position.y,
            start_level: self.start_level,
            start_attrs: self.start_attrs,
            start_items: self.start_items.clone(),
            start_skills: self.start_skills.clone(),
            areas,
        }
    }
}

/// Game world: module settings plus the object table of the active chapter.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    module_id: String,
    chapter: ChapterConf,
    areas: Vec<String>,
    chapters: Vec<ChapterData>,
    objects: BTreeMap<ObjectKey, WorldObject>,
    next_serial: u64,
    tick: u64,
    /// Incremented on every chapter switch.
    chapter_version: u64,
    paused: bool,
}

impl WorldState {
    /// Builds the world from module data. Objects without serial get a fresh
    /// one.
    pub fn import(data: &ModuleData) -> Self {
        let mut state = Self {
            module_id: data.id.clone(),
            chapters: data.chapters.clone(),
            ..Default::default()
        };
        state.load_chapter(&data.chapter);
        state
    }

    /// Exports the whole module, active chapter included.
    pub fn export(&self) -> ModuleData {
        ModuleData {
            id: self.module_id.clone(),
            chapter: self.export_chapter(),
            chapters: self.chapters.clone(),
        }
    }

    fn export_chapter(&self) -> ChapterData {
        let mut areas: Vec<AreaData> = self
            .areas
            .iter()
            .map(|id| AreaData {
                id: id.clone(),
                ..Default::default()
            })
            .collect();
        for object in self.objects.values() {
            let Some(area) = areas.iter_mut().find(|a| a.id == object.area_id()) else {
                continue;
            };
            match object {
                WorldObject::Character(c) => area.characters.push(c.to_data()),
                WorldObject::Area(o) => area.objects.push(o.to_data()),
            }
        }
        self.chapter.to_data(areas)
    }

    fn load_chapter(&mut self, data: &ChapterData) {
        self.chapter = ChapterConf::from_data(data);
        self.areas = data.areas.iter().map(|a| a.id.clone()).collect();
        self.bump_serials(data);
        for area in &data.areas {
            for char_data in &area.characters {
                let mut character = Character::from_data(char_data, &area.id);
                if character.serial.is_empty() {
                    character.serial = self.new_serial();
                }
                self.insert(WorldObject::Character(character));
            }
            for object_data in &area.objects {
                let mut object = AreaObject::from_data(object_data, &area.id);
                if object.serial.is_empty() {
                    object.serial = self.new_serial();
                }
                self.insert(WorldObject::Area(object));
            }
        }
    }

    /// Keeps fresh serials above every numeric serial already in use.
    fn bump_serials(&mut self, data: &ChapterData) {
        let serials = data.areas.iter().flat_map(|a| {
            a.characters
                .iter()
                .map(|c| c.serial.as_str())
                .chain(a.objects.iter().map(|o| o.serial.as_str()))
                .chain(
                    a.characters
                        .iter()
                        .flat_map(|c| c.inventory.items.iter().map(|i| i.serial.as_str())),
                )
        });
        for serial in serials {
            if let Ok(n) = serial.parse::<u64>() {
                self.next_serial = self.next_serial.max(n + 1);
            }
        }
    }

    pub fn new_serial(&mut self) -> String {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial.to_string()
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn chapter(&self) -> &ChapterConf {
        &self.chapter
    }

    pub fn areas(&self) -> &[String] {
        &self.areas
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn chapter_version(&self) -> u64 {
        self.chapter_version
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn insert(&mut self, object: WorldObject) {
        self.objects.insert(object.key(), object);
    }

    pub fn remove(&mut self, id: &str, serial: &str) -> Option<WorldObject> {
        self.objects.remove(&ObjectKey::new(id, serial))
    }

    pub fn object(&self, id: &str, serial: &str) -> Option<&WorldObject> {
        self.objects.get(&ObjectKey::new(id, serial))
    }

    pub fn object_mut(&mut self, id: &str, serial: &str) -> Option<&mut WorldObject> {
        self.objects.get_mut(&ObjectKey::new(id, serial))
    }

    pub fn character(&self, id: &str, serial: &str) -> Option<&Character> {
        self.object(id, serial).and_then(WorldObject::as_character)
    }

    pub fn character_mut(&mut self, id: &str, serial: &str) -> Option<&mut Character> {
        self.object_mut(id, serial)
            .and_then(WorldObject::as_character_mut)
    }

    pub fn contains(&self, id: &str, serial: &str) -> bool {
        self.objects.contains_key(&ObjectKey::new(id, serial))
    }

    pub fn objects(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.values()
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.objects.values().filter_map(WorldObject::as_character)
    }

    /// Keys of all characters carrying at least one of the specified flags.
    pub fn characters_with_flags(&self, flags: &[String]) -> Vec<ObjectKey> {
        self.characters()
            .filter(|c| flags.iter().any(|f| c.has_flag(f)))
            .map(|c| ObjectKey::new(&c.id, &c.serial))
            .collect()
    }

    /// Keys of all positioned objects in the area within range of the
    /// position.
    pub fn near(&self, area_id: &str, position: &Position, range: f64) -> Vec<ObjectKey> {
        self.objects
            .values()
            .filter(|o| o.area_id() == area_id)
            .filter(|o| {
                o.as_positioned()
                    .map(|p| p.position().distance(position) <= range)
                    .unwrap_or(false)
            })
            .map(WorldObject::key)
            .collect()
    }

    /// Checks if character data fits the start rules of the active chapter.
    pub fn valid_new_character(&self, data: &CharacterData) -> bool {
        let conf = &self.chapter;
        data.level <= conf.start_level
            && data.attributes.sum() <= conf.start_attrs
            && data
                .inventory
                .items
                .iter()
                .all(|i| conf.start_items.contains(&i.id))
            && data.skills.iter().all(|s| conf.start_skills.contains(&s.id))
    }

    /// Creates a new character from the data and places it at the chapter
    /// start position.
    pub fn spawn_character(&mut self, data: &CharacterData) -> Result<ObjectKey, WorldError> {
        if !self.valid_new_character(data) {
            return Err(WorldError::InvalidCharacter(data.id.clone()));
        }
        let start_area = self.chapter.start_area.clone();
        if !self.areas.contains(&start_area) {
            return Err(WorldError::StartAreaNotFound(start_area));
        }
        let mut character = Character::from_data(data, &start_area);
        character.serial = self.new_serial();
        for item in character.inventory.items_mut() {
            item.serial = self.new_serial();
        }
        if character.max_health <= 0 {
            character.max_health = character.health.max(1);
            character.health = character.max_health;
        }
        character.position = self.chapter.start_position;
        character.destination = self.chapter.start_position;
        character.target = None;
        let key = ObjectKey::new(&character.id, &character.serial);
        self.insert(WorldObject::Character(character));
        Ok(key)
    }

    /// Switches to another chapter of the module. Carried characters move to
    /// the start area of the new chapter, everything else stays behind with
    /// the previous chapter.
    pub fn set_chapter(&mut self, chapter_id: &str, carried: &[ObjectKey]) -> Result<(), WorldError> {
        let index = self
            .chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or_else(|| WorldError::ChapterNotFound(chapter_id.to_string()))?;
        let next = self.chapters.remove(index);
        if !next.areas.iter().any(|a| a.id == next.start_area) {
            self.chapters.insert(index, next.clone());
            return Err(WorldError::StartAreaNotFound(next.start_area));
        }
        let mut travellers: Vec<WorldObject> = carried
            .iter()
            .filter_map(|k| self.objects.remove(k))
            .collect();
        let previous = self.export_chapter();
        self.chapters.push(previous);
        self.objects.clear();
        self.load_chapter(&next);
        for traveller in travellers.iter_mut() {
            traveller.set_area(&next.start_area);
            if let Some(positioned) = traveller.as_positioned_mut() {
                positioned.set_position(self.chapter.start_position);
            }
        }
        for traveller in travellers {
            self.insert(traveller);
        }
        self.chapter_version += 1;
        info!("World: chapter changed: {}", chapter_id);
        Ok(())
    }

    /// Advances the simulation by the specified delta. Does nothing while
    /// paused.
    pub fn update(&mut self, delta_ms: i64) {
        if self.paused {
            return;
        }
        for object in self.objects.values_mut() {
            object.update(delta_ms, MOVE_SPEED);
        }
        self.tick += 1;
    }
}
