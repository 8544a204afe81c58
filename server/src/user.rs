//! Server users and the user directory.
//!
//! Each user lives in its own directory under the users dir, with a `.user`
//! file in the key-list grammar:
//!
//! ```text
//! pass:secret;
//! admin:false;
//! chars:hero#0;
//! char-flags:alice-char;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use log::warn;
use shared::{join_serial_id, split_serial_id};

use crate::config::{format_key_list, parse_key_list};
use crate::error::UserStoreError;
use crate::world::object::INACTIVE_FLAG;
use crate::world::WorldState;

pub const USER_FILE_NAME: &str = ".user";

/// Character controlled by a user, referenced by simulation ID and serial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnedCharacter {
    pub id: String,
    pub serial: String,
}

impl OwnedCharacter {
    pub fn new(id: &str, serial: &str) -> Self {
        Self {
            id: id.to_string(),
            serial: serial.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: String,
    pass: String,
    admin: bool,
    /// Set while exactly one session holds this user.
    pub logged: bool,
    char_flags: Vec<String>,
    chars: Vec<OwnedCharacter>,
}

impl User {
    pub fn new(id: &str, pass: &str) -> Self {
        Self {
            id: id.to_string(),
            pass: pass.to_string(),
            admin: false,
            logged: false,
            char_flags: Vec::new(),
            chars: Vec::new(),
        }
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_char_flags(mut self, flags: Vec<String>) -> Self {
        self.char_flags = flags;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn admin(&self) -> bool {
        self.admin
    }

    pub fn char_flags(&self) -> &[String] {
        &self.char_flags
    }

    pub fn chars(&self) -> &[OwnedCharacter] {
        &self.chars
    }

    /// Checks if the user controls the object with the specified ID and serial.
    pub fn controls(&self, id: &str, serial: &str) -> bool {
        self.chars.iter().any(|c| c.id == id && c.serial == serial)
    }

    pub fn add_char(&mut self, id: &str, serial: &str) {
        if !self.controls(id, serial) {
            self.chars.push(OwnedCharacter::new(id, serial));
        }
    }

    pub fn remove_char(&mut self, id: &str, serial: &str) {
        self.chars.retain(|c| !(c.id == id && c.serial == serial));
    }

    /// Keeps only owned characters accepted by the specified predicate.
    pub fn retain_chars<F>(&mut self, keep: F)
    where
        F: FnMut(&OwnedCharacter) -> bool,
    {
        self.chars.retain(keep);
    }

    /// Claims world characters flagged with one of the user's character
    /// flags and forgets owned characters no longer in the world.
    pub fn reconcile_chars(&mut self, state: &WorldState) {
        for key in state.characters_with_flags(&self.char_flags) {
            self.add_char(&key.id, &key.serial);
        }
        self.chars.retain(|c| state.contains(&c.id, &c.serial));
    }

    /// Clears or sets the inactive flag on all owned characters.
    pub fn set_chars_active(&self, state: &mut WorldState, active: bool) {
        for owned in &self.chars {
            if let Some(character) = state.character_mut(&owned.id, &owned.serial) {
                if active {
                    character.remove_flag(INACTIVE_FLAG);
                } else {
                    character.add_flag(INACTIVE_FLAG);
                }
            }
        }
    }

    fn from_key_list(id: &str, conf: &BTreeMap<String, Vec<String>>) -> Self {
        let first = |key: &str| conf.get(key).and_then(|v| v.first()).cloned();
        let mut user = User::new(id, &first("pass").unwrap_or_default());
        user.admin = first("admin").as_deref() == Some("true");
        for reference in conf.get("chars").into_iter().flatten() {
            let (char_id, serial) = split_serial_id(reference);
            if !char_id.is_empty() && !serial.is_empty() {
                user.add_char(char_id, serial);
            }
        }
        user.char_flags = conf.get("char-flags").cloned().unwrap_or_default();
        user
    }

    fn to_key_list(&self) -> BTreeMap<String, Vec<String>> {
        let mut conf = BTreeMap::new();
        conf.insert("pass".to_string(), vec![self.pass.clone()]);
        conf.insert("admin".to_string(), vec![self.admin.to_string()]);
        conf.insert(
            "chars".to_string(),
            self.chars
                .iter()
                .map(|c| join_serial_id(&c.id, &c.serial))
                .collect(),
        );
        conf.insert("char-flags".to_string(), self.char_flags.clone());
        conf
    }
}

/// In-memory mapping from user ID to user data.
///
/// Populated once at startup; afterwards mutated only by the event hub.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: HashMap<String, User>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all users from the directory with the specified path. Broken
    /// user directories are logged and skipped.
    pub fn load(path: &Path) -> Result<Self, UserStoreError> {
        let entries = fs::read_dir(path).map_err(|source| UserStoreError::ReadDir {
            path: path.to_path_buf(),
            source,
        })?;
        let mut directory = Self::new();
        for entry in entries.flatten() {
            let user_path = entry.path();
            if !user_path.is_dir() {
                continue;
            }
            match load_user(&user_path) {
                Ok(user) => directory.insert(user),
                Err(e) => warn!("Unable to load user: {}: {}", user_path.display(), e),
            }
        }
        Ok(directory)
    }

    /// Saves all users under the directory with the specified path.
    pub fn save(&self, path: &Path) -> Result<(), UserStoreError> {
        for user in self.users.values() {
            let user_path = path.join(user.id());
            let write_err = |source| UserStoreError::Write {
                id: user.id().to_string(),
                source,
            };
            fs::create_dir_all(&user_path).map_err(write_err)?;
            fs::write(
                user_path.join(USER_FILE_NAME),
                format_key_list(&user.to_key_list()),
            )
            .map_err(write_err)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, user: User) {
        self.users.insert(user.id().to_string(), user);
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut User> {
        self.users.values_mut()
    }

    /// Checks if any user owns the character with the specified ID and serial.
    pub fn owner_of(&self, id: &str, serial: &str) -> Option<&User> {
        self.users.values().find(|u| u.controls(id, serial))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn load_user(path: &Path) -> Result<User, UserStoreError> {
    let file_path = path.join(USER_FILE_NAME);
    let text = fs::read_to_string(&file_path).map_err(|source| UserStoreError::ReadUser {
        path: file_path.clone(),
        source,
    })?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(User::from_key_list(&id, &parse_key_list(&text)))
}
