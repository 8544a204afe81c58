//! Server responses.

use serde::{Deserialize, Serialize};

use crate::data::{CharacterData, ModuleData, ObjectDialogData};
use crate::request::ItemList;
use crate::ProtocolError;

/// One response line. Empty lists and absent sections are skipped on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Response {
    /// Client must (re)authenticate.
    pub logon: bool,
    pub paused: bool,
    /// Server is going down.
    pub closed: bool,
    pub change_chapter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Update>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub character: Vec<Character>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_char: Vec<CharacterData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trade: Vec<Trade>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trade_completed: Vec<Trade>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dialog: Vec<ObjectDialogData>,
    #[serde(rename = "use", skip_serializing_if = "Vec::is_empty")]
    pub use_object: Vec<Use>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chat: Vec<Chat>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<Load>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<String>,
}

impl Response {
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line.trim_end()).map_err(ProtocolError::Syntax)
    }

    /// Encodes the response without line terminator.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// True if the response carries nothing but default values.
    pub fn is_empty(&self) -> bool {
        *self == Response::default()
    }
}

/// World snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Update {
    pub module: ModuleData,
    pub message: String,
}

/// Character owned by the receiving user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub id: String,
    pub serial: String,
}

/// Trade proposal or completed trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Trade {
    pub id: u64,
    pub buyer_id: String,
    pub buyer_serial: String,
    pub seller_id: String,
    pub seller_serial: String,
    pub items_buy: ItemList,
    pub items_sell: ItemList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Use {
    pub object_id: String,
    pub object_serial: String,
    pub user_id: String,
    pub user_serial: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Chat {
    pub object_id: String,
    pub object_serial: String,
    pub message: String,
    pub translated: bool,
    /// Milliseconds since the UNIX epoch.
    pub time: u64,
}

/// Command result: result code and captured output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    pub result: i32,
    pub out: String,
}

/// Reload notice carrying the freshly loaded module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Load {
    pub module: ModuleData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sections_skipped() {
        let line = Response::default().to_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["logon"], false);
        assert!(value.get("update").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("trade").is_none());
    }

    #[test]
    fn test_is_empty() {
        assert!(Response::default().is_empty());
        let response = Response {
            error: vec!["failure".to_string()],
            ..Default::default()
        };
        assert!(!response.is_empty());
    }

    #[test]
    fn test_trade_field_names() {
        let mut trade = Trade {
            id: 7,
            buyer_id: "hero".to_string(),
            seller_id: "merchant".to_string(),
            ..Default::default()
        };
        trade.items_buy.insert("sword".to_string(), vec!["1".to_string()]);
        let response = Response {
            trade: vec![trade],
            ..Default::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&response.to_line().unwrap()).unwrap();

        assert_eq!(value["trade"][0]["id"], 7);
        assert_eq!(value["trade"][0]["buyer-id"], "hero");
        assert_eq!(value["trade"][0]["items-buy"]["sword"][0], "1");
    }

    #[test]
    fn test_use_field_renamed() {
        let response = Response {
            use_object: vec![Use {
                object_id: "potion".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&response.to_line().unwrap()).unwrap();
        assert_eq!(value["use"][0]["object-id"], "potion");
    }
}
