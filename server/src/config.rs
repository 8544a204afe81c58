//! Server configuration file.
//!
//! The file is a list of `key:value1;value2;` lines. The same grammar is used
//! by user files, see [`crate::user`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;

use crate::error::ConfigError;

pub const NAME: &str = "Fire";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CONFIG_FILE_NAME: &str = ".fire";

/// Parses `key:value1;value2;` lines into a key to values map.
///
/// Blank lines and lines starting with `#` are skipped, as are lines without
/// a key separator.
pub fn parse_key_list(text: &str) -> BTreeMap<String, Vec<String>> {
    let mut conf = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, values)) = line.split_once(':') else {
            continue;
        };
        let values = values
            .split(';')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();
        conf.insert(key.trim().to_string(), values);
    }
    conf
}

/// Formats a key to values map in the `key:value1;value2;` grammar.
pub fn format_key_list(conf: &BTreeMap<String, Vec<String>>) -> String {
    let mut text = String::new();
    for (key, values) in conf {
        text.push_str(key);
        text.push(':');
        for value in values {
            text.push_str(value);
            text.push(';');
        }
        text.push('\n');
    }
    text
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub module: String,
    /// Sleep between two world updates.
    pub update_break: Duration,
    /// Maximal distance between objects for dialogs, trades and transfers.
    pub action_min_range: f64,
    /// Radius of near-range notifications.
    pub sight_range: f64,
    /// Interval of the periodic world snapshot broadcast.
    pub broadcast_interval: Duration,
    /// Depth of each client's outbound queue.
    pub client_queue: usize,
    /// Message attached to every world snapshot.
    pub message: String,
    pub users_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub saves_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            module: String::new(),
            update_break: Duration::from_millis(1000),
            action_min_range: 50.0,
            sight_range: 300.0,
            broadcast_interval: Duration::from_millis(1000),
            client_queue: 2,
            message: String::new(),
            users_dir: PathBuf::from("data/users"),
            modules_dir: PathBuf::from("data/modules"),
            saves_dir: PathBuf::from("data/saves"),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the file under the specified path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_key_list(&parse_key_list(&text)))
    }

    /// Saves configuration to the file under the specified path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, format_key_list(&self.to_key_list())).map_err(|source| {
            ConfigError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn from_key_list(conf: &BTreeMap<String, Vec<String>>) -> Self {
        let mut config = Self::default();
        let first = |key: &str| conf.get(key).and_then(|v| v.first()).cloned();
        if let Some(host) = first("host") {
            config.host = host;
        }
        if let Some(port) = first("port") {
            parse_into(&port, "port", &mut config.port);
        }
        if let Some(module) = first("module") {
            config.module = module;
        }
        if let Some(value) = first("update-break") {
            let mut millis = config.update_break.as_millis() as u64;
            parse_into(&value, "update-break", &mut millis);
            config.update_break = Duration::from_millis(millis.max(1));
        }
        if let Some(value) = first("action-min-range") {
            parse_into(&value, "action-min-range", &mut config.action_min_range);
        }
        if let Some(value) = first("sight-range") {
            parse_into(&value, "sight-range", &mut config.sight_range);
        }
        if let Some(value) = first("broadcast-interval") {
            let mut millis = config.broadcast_interval.as_millis() as u64;
            parse_into(&value, "broadcast-interval", &mut millis);
            config.broadcast_interval = Duration::from_millis(millis.max(1));
        }
        if let Some(value) = first("client-queue") {
            parse_into(&value, "client-queue", &mut config.client_queue);
            config.client_queue = config.client_queue.max(1);
        }
        if let Some(message) = conf.get("message") {
            config.message = message.join(";");
        }
        if let Some(dir) = first("users-dir") {
            config.users_dir = PathBuf::from(dir);
        }
        if let Some(dir) = first("modules-dir") {
            config.modules_dir = PathBuf::from(dir);
        }
        if let Some(dir) = first("saves-dir") {
            config.saves_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn to_key_list(&self) -> BTreeMap<String, Vec<String>> {
        let mut conf = BTreeMap::new();
        conf.insert("host".to_string(), vec![self.host.clone()]);
        conf.insert("port".to_string(), vec![self.port.to_string()]);
        conf.insert("module".to_string(), vec![self.module.clone()]);
        conf.insert(
            "update-break".to_string(),
            vec![self.update_break.as_millis().to_string()],
        );
        conf.insert(
            "action-min-range".to_string(),
            vec![format!("{:.6}", self.action_min_range)],
        );
        conf.insert(
            "sight-range".to_string(),
            vec![format!("{:.6}", self.sight_range)],
        );
        conf.insert(
            "broadcast-interval".to_string(),
            vec![self.broadcast_interval.as_millis().to_string()],
        );
        conf.insert(
            "client-queue".to_string(),
            vec![self.client_queue.to_string()],
        );
        if !self.message.is_empty() {
            conf.insert("message".to_string(), vec![self.message.clone()]);
        }
        conf.insert(
            "users-dir".to_string(),
            vec![self.users_dir.display().to_string()],
        );
        conf.insert(
            "modules-dir".to_string(),
            vec![self.modules_dir.display().to_string()],
        );
        conf.insert(
            "saves-dir".to_string(),
            vec![self.saves_dir.display().to_string()],
        );
        conf
    }

    /// Address for the TCP listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path to the configured module: a `<module>.json` file or a directory
    /// with the module name.
    pub fn module_path(&self) -> PathBuf {
        let dir = self.modules_dir.join(&self.module);
        if dir.is_dir() {
            dir
        } else {
            self.modules_dir.join(format!("{}.json", self.module))
        }
    }

    /// Path of the named save file. `None` for names that are not a plain
    /// file name inside the saves dir.
    pub fn save_path(&self, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', ':']);
        plain.then(|| self.saves_dir.join(format!("{}.json", name)))
    }
}

fn parse_into<T: std::str::FromStr>(value: &str, key: &str, target: &mut T) {
    match value.parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!("Config: invalid value for {}: {}", key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_parse_key_list() {
        let text = "# server\nhost:localhost;\nchars:guard#0;hero#1;\n\nbroken line\nempty:\n";
        let conf = parse_key_list(text);

        assert_eq!(conf["host"], vec!["localhost"]);
        assert_eq!(conf["chars"], vec!["guard#0", "hero#1"]);
        assert!(conf["empty"].is_empty());
        assert!(!conf.contains_key("broken line"));
    }

    #[test]
    fn test_format_and_parse_key_list() {
        let mut conf = BTreeMap::new();
        conf.insert("flags".to_string(), vec!["a".to_string(), "b".to_string()]);
        conf.insert("pass".to_string(), vec!["pw".to_string()]);

        let text = format_key_list(&conf);
        assert_eq!(text, "flags:a;b;\npass:pw;\n");
        assert_eq!(parse_key_list(&text), conf);
    }

    #[test]
    fn test_config_from_key_list() {
        let conf = parse_key_list(
            "host:0.0.0.0;\nport:9000;\nmodule:test;\naction-min-range:75.5;\nupdate-break:250;\nclient-queue:0;\nmessage:Hello;\n",
        );
        let config = ServerConfig::from_key_list(&conf);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.module, "test");
        assert_approx_eq!(config.action_min_range, 75.5, 1e-9);
        assert_eq!(config.update_break, Duration::from_millis(250));
        assert_eq!(config.client_queue, 1);
        assert_eq!(config.message, "Hello");
        assert_eq!(config.address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let conf = parse_key_list("port:eighty;\naction-min-range:far;\n");
        let config = ServerConfig::from_key_list(&conf);
        let defaults = ServerConfig::default();

        assert_eq!(config.port, defaults.port);
        assert_approx_eq!(config.action_min_range, defaults.action_min_range, 1e-9);
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let conf = parse_key_list("update-break:0;\nbroadcast-interval:0;\n");
        let config = ServerConfig::from_key_list(&conf);

        assert_eq!(config.update_break, Duration::from_millis(1));
        assert_eq!(config.broadcast_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_save_path() {
        let config = ServerConfig::default();

        assert_eq!(
            config.save_path("slot1"),
            Some(PathBuf::from("data/saves/slot1.json"))
        );
        assert_eq!(config.save_path("../../etc/x"), None);
        assert_eq!(config.save_path("a/b"), None);
        assert_eq!(config.save_path("a\\b"), None);
        assert_eq!(config.save_path(".hidden"), None);
        assert_eq!(config.save_path(""), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = ServerConfig {
            module: "arena".to_string(),
            port: 8123,
            message: "Welcome".to_string(),
            ..Default::default()
        };

        config.save(&path).unwrap();
        let loaded = ServerConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        assert!(matches!(
            ServerConfig::load(&path),
            Err(ConfigError::Read { .. })
        ));
    }
}
