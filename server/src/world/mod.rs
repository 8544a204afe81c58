//! In-process game world.
//!
//! The [`World`] handle is shared between the update task, the event hub and
//! script tasks. All access goes through the internal lock, so request
//! handlers always see a consistent object table even while the update task
//! advances the simulation.

pub mod dialog;
pub mod inventory;
pub mod object;
pub mod position;
pub mod script;
pub mod state;

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use shared::ModuleData;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::error::WorldError;

pub use object::{AreaObject, Character, Container, Positioned, Talker, Usable, WorldObject};
pub use position::Position;
pub use script::{Script, ScriptRunner};
pub use state::WorldState;

/// File with module data inside a module directory.
pub const MODULE_FILE_NAME: &str = "module.json";
/// Scripts directory inside a module directory.
pub const SCRIPTS_DIR_NAME: &str = "scripts";

/// Identifies a world object by ID and serial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub id: String,
    pub serial: String,
}

impl ObjectKey {
    pub fn new(id: &str, serial: &str) -> Self {
        Self {
            id: id.to_string(),
            serial: serial.to_string(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.serial)
    }
}

/// Module data together with the scripts shipped alongside it.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub data: ModuleData,
    pub scripts: Vec<Script>,
}

/// Loads a module from a JSON file, or from a directory holding
/// `module.json` and an optional `scripts` directory.
pub fn load_module(path: &Path) -> Result<Module, WorldError> {
    if path.is_dir() {
        let data = read_module_data(&path.join(MODULE_FILE_NAME))?;
        let scripts = Script::load_dir(&path.join(SCRIPTS_DIR_NAME))?;
        return Ok(Module { data, scripts });
    }
    Ok(Module {
        data: read_module_data(path)?,
        scripts: Vec::new(),
    })
}

fn read_module_data(path: &Path) -> Result<ModuleData, WorldError> {
    let text = fs::read_to_string(path).map_err(|source| WorldError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| WorldError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes module data as a JSON file, creating parent directories.
pub fn save_module(path: &Path, data: &ModuleData) -> Result<(), WorldError> {
    let text = serde_json::to_string_pretty(data).map_err(WorldError::Encode)?;
    let write_err = |source| WorldError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, text).map_err(write_err)
}

/// Shared handle to the world state.
#[derive(Debug, Clone)]
pub struct World {
    state: Arc<RwLock<WorldState>>,
}

impl World {
    pub fn new(state: WorldState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, WorldState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, WorldState> {
        self.state.write().await
    }

    /// Swaps in a freshly loaded state. Every holder of this handle sees the
    /// new state.
    pub async fn replace(&self, state: WorldState) {
        *self.state.write().await = state;
    }

    /// Runs the simulation, updating the world once per update break.
    pub async fn run_updates(self, update_break: Duration) {
        let mut ticker = interval(update_break);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick fires immediately.
        ticker.tick().await;
        let mut last_update = Instant::now();

        info!("World: update loop started, break: {:?}", update_break);
        loop {
            ticker.tick().await;
            let now = Instant::now();
            let delta_ms = now.duration_since(last_update).as_millis() as i64;
            last_update = now;

            let mut state = self.state.write().await;
            state.update(delta_ms);
            if state.tick() % 60 == 0 && state.tick() > 0 {
                debug!(
                    "World: tick {}, {} objects, last delta {}ms",
                    state.tick(),
                    state.objects().count(),
                    delta_ms
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{AreaData, ChapterData, CharacterData};

    fn module_data() -> ModuleData {
        ModuleData {
            id: "test".to_string(),
            chapter: ChapterData {
                id: "ch1".to_string(),
                start_area: "town".to_string(),
                areas: vec![AreaData {
                    id: "town".to_string(),
                    characters: vec![CharacterData {
                        id: "guard".to_string(),
                        serial: "0".to_string(),
                        health: 10,
                        dest_x: 100.0,
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("guard", "3").to_string(), "guard 3");
    }

    #[test]
    fn test_save_and_load_module_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("modules").join("test.json");
        save_module(&path, &module_data()).unwrap();

        let module = load_module(&path).unwrap();

        assert_eq!(module.data, module_data());
        assert!(module.scripts.is_empty());
    }

    #[test]
    fn test_load_module_dir_with_scripts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("test");
        save_module(&dir.join(MODULE_FILE_NAME), &module_data()).unwrap();
        fs::create_dir_all(dir.join(SCRIPTS_DIR_NAME)).unwrap();
        fs::write(
            dir.join(SCRIPTS_DIR_NAME).join("intro.ash"),
            "wait 10\nmoduleman -o show -a id\n",
        )
        .unwrap();

        let module = load_module(&dir).unwrap();

        assert_eq!(module.data.id, "test");
        assert_eq!(module.scripts.len(), 1);
        assert_eq!(module.scripts[0].name(), "intro");
    }

    #[test]
    fn test_load_invalid_module() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("invalid.json");
        fs::write(&path, "{not json").unwrap();

        let result = load_module(&path);

        assert!(matches!(result, Err(WorldError::Parse { .. })));
    }

    #[test]
    fn test_replace_is_seen_by_clones() {
        let world = World::new(WorldState::default());
        let handle = world.clone();

        tokio_test::block_on(world.replace(WorldState::import(&module_data())));

        let state = tokio_test::block_on(handle.read());
        assert_eq!(state.module_id(), "test");
        assert!(state.contains("guard", "0"));
    }

    #[tokio::test]
    async fn test_run_updates_moves_characters() {
        let world = World::new(WorldState::import(&module_data()));
        let task = tokio::spawn(world.clone().run_updates(Duration::from_millis(20)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();

        let state = world.read().await;
        assert!(state.tick() >= 2);
        assert!(state.character("guard", "0").unwrap().position.x > 0.0);
    }
}
