//! Admin command facility.
//!
//! Commands are whitespace separated: `tool -o option [-t target] [-a args...]`.
//! Every command yields a result code and a text output that are sent back
//! to the client unchanged.

use shared::{join_serial_id, split_serial_id};

use crate::world::inventory::Item;
use crate::world::{ObjectKey, Position, WorldState};

pub const RESULT_OK: i32 = 0;
pub const RESULT_SYNTAX: i32 = 1;
pub const RESULT_NOT_FOUND: i32 = 2;
pub const RESULT_UNSUPPORTED: i32 = 3;

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub tool: String,
    pub option: String,
    pub target: Option<String>,
    pub args: Vec<String>,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut tokens = line.split_whitespace();
        let tool = tokens.next().ok_or("empty command")?;
        let mut command = Command {
            tool: tool.to_string(),
            ..Default::default()
        };
        while let Some(flag) = tokens.next() {
            match flag {
                "-o" => {
                    command.option = tokens.next().ok_or("missing option value")?.to_string();
                }
                "-t" => {
                    command.target = Some(tokens.next().ok_or("missing target value")?.to_string());
                }
                "-a" => {
                    command.args = tokens.by_ref().map(String::from).collect();
                }
                other => return Err(format!("unknown flag: {}", other)),
            }
        }
        if command.option.is_empty() {
            return Err("no option specified".to_string());
        }
        Ok(command)
    }

    fn arg(&self, index: usize) -> Result<&str, (i32, String)> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| (RESULT_SYNTAX, format!("missing argument #{}", index + 1)))
    }
}

/// Executes the command line on the world. `carried` lists characters taken
/// along on a chapter change.
pub fn execute(state: &mut WorldState, line: &str, carried: &[ObjectKey]) -> (i32, String) {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => return (RESULT_SYNTAX, e),
    };
    let result = match command.tool.as_str() {
        "moduleman" => moduleman(state, &command, carried),
        "charman" => charman(state, &command),
        other => Err((RESULT_UNSUPPORTED, format!("unknown tool: {}", other))),
    };
    match result {
        Ok(out) => (RESULT_OK, out),
        Err(failure) => failure,
    }
}

fn moduleman(
    state: &mut WorldState,
    command: &Command,
    carried: &[ObjectKey],
) -> Result<String, (i32, String)> {
    match command.option.as_str() {
        "show" => match command.arg(0)? {
            "id" => Ok(state.module_id().to_string()),
            "chapter" => Ok(state.chapter().id.clone()),
            "areas" => Ok(state.areas().join(" ")),
            other => Err((RESULT_UNSUPPORTED, format!("unknown property: {}", other))),
        },
        "set-chapter" => {
            let chapter_id = command.arg(0)?;
            state
                .set_chapter(chapter_id, carried)
                .map_err(|e| (RESULT_NOT_FOUND, e.to_string()))?;
            Ok(String::new())
        }
        other => Err((RESULT_UNSUPPORTED, format!("unknown option: {}", other))),
    }
}

fn charman(state: &mut WorldState, command: &Command) -> Result<String, (i32, String)> {
    let target = command
        .target
        .as_deref()
        .ok_or_else(|| (RESULT_SYNTAX, "no target specified".to_string()))?;
    let (id, serial) = split_serial_id(target);
    if state.character(id, serial).is_none() {
        return Err((RESULT_NOT_FOUND, format!("character not found: {}", target)));
    }
    match command.option.as_str() {
        "show" => {
            let Some(character) = state.character(id, serial) else {
                return Err((RESULT_NOT_FOUND, format!("character not found: {}", target)));
            };
            match command.arg(0)? {
                "position" => Ok(character.position.to_string()),
                "health" => Ok(format!("{}/{}", character.health, character.max_health)),
                "items" => Ok(character
                    .inventory
                    .items()
                    .iter()
                    .map(|i| join_serial_id(&i.id, &i.serial))
                    .collect::<Vec<_>>()
                    .join(" ")),
                "flags" => Ok(character.flags.join(" ")),
                other => Err((RESULT_UNSUPPORTED, format!("unknown property: {}", other))),
            }
        }
        "set" => {
            let property = command.arg(0)?.to_string();
            let Some(character) = state.character_mut(id, serial) else {
                return Err((RESULT_NOT_FOUND, format!("character not found: {}", target)));
            };
            match property.as_str() {
                "position" => {
                    let x = parse_number::<f64>(command.arg(1)?)?;
                    let y = parse_number::<f64>(command.arg(2)?)?;
                    character.position = Position::new(x, y);
                    character.destination = character.position;
                    Ok(String::new())
                }
                "health" => {
                    let health = parse_number::<i64>(command.arg(1)?)?;
                    character.health = health.clamp(0, character.max_health);
                    Ok(String::new())
                }
                other => Err((RESULT_UNSUPPORTED, format!("unknown property: {}", other))),
            }
        }
        "add" => match command.arg(0)? {
            "item" => {
                let item_id = command.arg(1)?.to_string();
                let value = match command.args.get(2) {
                    Some(value) => parse_number::<i64>(value)?,
                    None => 0,
                };
                let item = Item {
                    id: item_id,
                    serial: state.new_serial(),
                    value,
                    slots: Vec::new(),
                    effect: None,
                    consumable: false,
                };
                let out = join_serial_id(&item.id, &item.serial);
                if let Some(character) = state.character_mut(id, serial) {
                    character.inventory.add(item);
                }
                Ok(out)
            }
            "flag" => {
                let flag = command.arg(1)?.to_string();
                if let Some(character) = state.character_mut(id, serial) {
                    character.add_flag(&flag);
                }
                Ok(String::new())
            }
            other => Err((RESULT_UNSUPPORTED, format!("unknown property: {}", other))),
        },
        other => Err((RESULT_UNSUPPORTED, format!("unknown option: {}", other))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, (i32, String)> {
    value
        .parse()
        .map_err(|_| (RESULT_SYNTAX, format!("invalid number: {}", value)))
}
