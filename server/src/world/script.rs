//! Module scripts.
//!
//! A script is a text file of command lines executed one after another
//! through the command facility. The only script-level statement is
//! `wait <ms>`, which pauses the script.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;

use super::World;
use crate::command;
use crate::error::WorldError;

pub const SCRIPT_EXTENSION: &str = "ash";

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Wait(Duration),
    Command(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    name: String,
    steps: Vec<ScriptStep>,
}

impl Script {
    /// Parses script text. Blank lines and `#` comments are skipped, an
    /// invalid wait time is logged and skipped as well.
    pub fn parse(name: &str, text: &str) -> Self {
        let mut steps = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix("wait ") {
                Some(millis) => match millis.trim().parse::<u64>() {
                    Ok(millis) => steps.push(ScriptStep::Wait(Duration::from_millis(millis))),
                    Err(_) => warn!("Script {}: invalid wait time: {}", name, millis),
                },
                None => steps.push(ScriptStep::Command(line.to_string())),
            }
        }
        Self {
            name: name.to_string(),
            steps,
        }
    }

    /// Loads all `.ash` scripts from the directory. A missing directory
    /// means no scripts.
    pub fn load_dir(path: &Path) -> Result<Vec<Script>, WorldError> {
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let read_err = |source| WorldError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut scripts = Vec::new();
        for entry in fs::read_dir(path).map_err(read_err)?.flatten() {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
                continue;
            }
            let name = file
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = fs::read_to_string(&file).map_err(|source| WorldError::Read {
                path: file.clone(),
                source,
            })?;
            scripts.push(Script::parse(&name, &text));
        }
        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scripts)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    async fn run(self, world: World) {
        for step in self.steps {
            match step {
                ScriptStep::Wait(duration) => tokio::time::sleep(duration).await,
                ScriptStep::Command(line) => {
                    let (result, out) = {
                        let mut state = world.write().await;
                        command::execute(&mut state, &line, &[])
                    };
                    if result != command::RESULT_OK {
                        warn!("Script {}: command failed: {}: [{}] {}", self.name, line, result, out);
                    }
                }
            }
        }
        info!("Script {}: finished", self.name);
    }
}

/// Owns the tasks of running scripts.
#[derive(Debug, Default)]
pub struct ScriptRunner {
    tasks: Vec<JoinHandle<()>>,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts every script on its own task.
    pub fn start(&mut self, scripts: &[Script], world: &World) {
        self.tasks.retain(|t| !t.is_finished());
        for script in scripts {
            info!("Script {}: started", script.name());
            self.tasks
                .push(tokio::spawn(script.clone().run(world.clone())));
        }
    }

    /// Aborts all running scripts.
    pub fn stop_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}

impl Drop for ScriptRunner {
    fn drop(&mut self) {
        self.stop_all();
    }
}
