//! Client requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::CharacterData;
use crate::ProtocolError;

/// Item references grouped by item ID: `{"item-id": ["serial1", "serial2"]}`.
pub type ItemList = BTreeMap<String, Vec<String>>;

/// One request line. Every field may be absent; kinds are handled in a fixed
/// order, login first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Request {
    pub login: Vec<Login>,
    pub new_char: Vec<CharacterData>,
    pub set_pos: Vec<SetPos>,
    #[serde(rename = "move")]
    pub move_to: Vec<Move>,
    pub dialog: Vec<Dialog>,
    pub dialog_answer: Vec<DialogAnswer>,
    pub dialog_end: Vec<Dialog>,
    pub trade: Vec<Trade>,
    pub transfer_items: Vec<TransferItems>,
    pub throw_items: Vec<ThrowItems>,
    #[serde(rename = "use")]
    pub use_object: Vec<Use>,
    pub equip: Vec<Equip>,
    pub unequip: Vec<Unequip>,
    pub training: Vec<Training>,
    pub chat: Vec<Chat>,
    pub target: Vec<Target>,
    /// Save file names to export the world into.
    pub save: Vec<String>,
    /// Save file names to load the world from.
    pub load: Vec<String>,
    pub command: Vec<String>,
    /// Pending confirmation IDs to accept.
    pub accept: Vec<u64>,
    /// Pending confirmation IDs to reject.
    pub reject: Vec<u64>,
    /// Shutdown deadline in nanoseconds since the UNIX epoch.
    pub close: Option<i64>,
    pub pause: Option<bool>,
}

impl Request {
    /// Decodes a single request line (terminator already stripped).
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line.trim_end()).map_err(ProtocolError::Syntax)
    }

    pub fn to_line(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Login {
    pub id: String,
    pub pass: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SetPos {
    pub id: String,
    pub serial: String,
    pub pos_x: f64,
    pub pos_y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Move {
    pub id: String,
    pub serial: String,
    pub pos_x: f64,
    pub pos_y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Dialog {
    pub target_id: String,
    pub target_serial: String,
    pub owner_id: String,
    pub owner_serial: String,
    pub dialog_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DialogAnswer {
    #[serde(flatten)]
    pub dialog: Dialog,
    pub answer_id: String,
}

/// Trade proposal: `buy` moves items from the seller to the buyer, `sell`
/// moves items from the buyer to the seller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trade {
    pub buy: TransferItems,
    pub sell: TransferItems,
}

impl Trade {
    pub fn buyer(&self) -> (&str, &str) {
        (&self.buy.object_to_id, &self.buy.object_to_serial)
    }

    pub fn seller(&self) -> (&str, &str) {
        (&self.sell.object_to_id, &self.sell.object_to_serial)
    }

    /// Both sections move items between the same two objects, in opposite
    /// directions.
    pub fn parties_match(&self) -> bool {
        self.buy.object_from_id == self.sell.object_to_id
            && self.buy.object_from_serial == self.sell.object_to_serial
            && self.buy.object_to_id == self.sell.object_from_id
            && self.buy.object_to_serial == self.sell.object_from_serial
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TransferItems {
    pub object_from_id: String,
    pub object_from_serial: String,
    pub object_to_id: String,
    pub object_to_serial: String,
    pub items: ItemList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ThrowItems {
    pub object_id: String,
    pub object_serial: String,
    pub items: ItemList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Use {
    pub user_id: String,
    pub user_serial: String,
    pub object_id: String,
    pub object_serial: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Equip {
    pub char_id: String,
    pub char_serial: String,
    pub item_id: String,
    pub item_serial: String,
    #[serde(rename = "slot")]
    pub slots: Vec<EquipmentSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Unequip {
    pub char_id: String,
    pub char_serial: String,
    pub item_id: String,
    pub item_serial: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentSlot {
    #[serde(rename = "type")]
    pub slot_type: String,
    pub id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Training {
    pub trainer_id: String,
    pub trainer_serial: String,
    pub user_id: String,
    pub user_serial: String,
    pub training_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Chat {
    pub object_id: String,
    pub object_serial: String,
    pub message: String,
    pub translated: bool,
}

/// Target change; empty target ID and serial clear the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Target {
    pub object_id: String,
    pub object_serial: String,
    pub target_id: String,
    pub target_serial: String,
}
