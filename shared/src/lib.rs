//! Wire protocol shared by the game server and its line clients.
//!
//! Every message is a single JSON document terminated by `\r\n`. Clients send
//! [`Request`] documents, the server answers with [`Response`] documents. One
//! request line may batch several request kinds; every list field is optional.
//!
//! World snapshots travel inside [`response::Update`] as [`ModuleData`], the
//! same structure used to import and export modules on the server.

pub mod data;
pub mod request;
pub mod response;

pub use data::{
    AreaData, AttributesData, ChapterData, CharacterData, DialogAnswerData, DialogData,
    DialogStageData, EffectData, EquipmentSlotData, InventoryData, ItemData, ModuleData,
    ObjectData, ObjectDialogData, SkillData, TrainingData,
};
pub use request::Request;
pub use response::Response;

/// Terminator appended to every line written on the wire.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Separator between object ID and serial in textual references (`id#serial`).
pub const SERIAL_SEPARATOR: char = '#';

/// Errors produced while decoding or encoding protocol lines.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid request syntax: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("unable to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Splits an `id#serial` reference. A reference without separator has an
/// empty serial.
pub fn split_serial_id(text: &str) -> (&str, &str) {
    match text.split_once(SERIAL_SEPARATOR) {
        Some((id, serial)) => (id, serial),
        None => (text, ""),
    }
}

/// Joins object ID and serial into an `id#serial` reference.
pub fn join_serial_id(id: &str, serial: &str) -> String {
    format!("{}{}{}", id, SERIAL_SEPARATOR, serial)
}
