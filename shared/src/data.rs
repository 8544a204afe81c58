//! Module resource data.
//!
//! These structures describe a whole game module: its active chapter, areas,
//! characters and area objects. The server imports them to build its world,
//! exports them for save files, and sends them to clients as world snapshots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ModuleData {
    pub id: String,
    pub chapter: ChapterData,
    /// Chapters available for a chapter switch, besides the active one.
    pub chapters: Vec<ChapterData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChapterData {
    pub id: String,
    pub start_area: String,
    pub start_pos_x: f64,
    pub start_pos_y: f64,
    pub start_level: u32,
    /// Maximal sum of attributes for a new character.
    pub start_attrs: u32,
    pub start_items: Vec<String>,
    pub start_skills: Vec<String>,
    pub areas: Vec<AreaData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AreaData {
    pub id: String,
    pub characters: Vec<CharacterData>,
    pub objects: Vec<ObjectData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CharacterData {
    pub id: String,
    pub serial: String,
    pub name: String,
    pub level: u32,
    pub health: i64,
    pub max_health: i64,
    pub attributes: AttributesData,
    pub pos_x: f64,
    pub pos_y: f64,
    pub dest_x: f64,
    pub dest_y: f64,
    pub flags: Vec<String>,
    pub inventory: InventoryData,
    pub equipment: Vec<EquipmentSlotData>,
    pub dialogs: Vec<DialogData>,
    pub skills: Vec<SkillData>,
    pub trainings: Vec<TrainingData>,
    pub target_id: String,
    pub target_serial: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributesData {
    pub str: u32,
    pub con: u32,
    pub dex: u32,
    pub int: u32,
    pub wis: u32,
}

impl AttributesData {
    pub fn sum(&self) -> u32 {
        self.str + self.con + self.dex + self.int + self.wis
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryData {
    pub items: Vec<ItemData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ItemData {
    pub id: String,
    pub serial: String,
    pub value: i64,
    /// Equipment slot types this item occupies when equipped.
    pub slots: Vec<String>,
    pub effect: Option<EffectData>,
    pub consumable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EquipmentSlotData {
    #[serde(rename = "type")]
    pub slot_type: String,
    pub id: u32,
    pub item_id: String,
    pub item_serial: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectData {
    /// Health change applied to the affected object.
    pub health: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DialogData {
    pub id: String,
    /// Active stage ID, empty when the dialog is not started.
    pub stage: String,
    pub target_id: String,
    pub target_serial: String,
    pub stages: Vec<DialogStageData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DialogStageData {
    pub id: String,
    pub start: bool,
    pub answers: Vec<DialogAnswerData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DialogAnswerData {
    pub id: String,
    /// Next stage ID, empty answer target ends the dialog.
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SkillData {
    pub id: String,
    pub effect: EffectData,
    pub range: f64,
    /// Cooldown in milliseconds.
    pub cooldown: i64,
    pub cooldown_left: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TrainingData {
    pub id: String,
    pub attribute: String,
    pub value: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ObjectData {
    pub id: String,
    pub serial: String,
    pub name: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub inventory: InventoryData,
    pub effect: Option<EffectData>,
}

/// Dialog state reported back to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ObjectDialogData {
    pub dialog_id: String,
    pub dialog_stage: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_module_data_defaults_from_sparse_json() {
        let json = r#"{
            "id": "test",
            "chapter": {
                "id": "ch1",
                "start-area": "area1",
                "start-pos-x": 10.5,
                "areas": [{"id": "area1", "characters": [{"id": "guard", "serial": "0"}]}]
            }
        }"#;
        let data: ModuleData = serde_json::from_str(json).unwrap();

        assert_eq!(data.id, "test");
        assert_eq!(data.chapter.start_area, "area1");
        assert_approx_eq!(data.chapter.start_pos_x, 10.5, 1e-9);
        assert_approx_eq!(data.chapter.start_pos_y, 0.0, 1e-9);
        assert!(data.chapters.is_empty());

        let guard = &data.chapter.areas[0].characters[0];
        assert_eq!(guard.id, "guard");
        assert!(guard.inventory.items.is_empty());
        assert_eq!(guard.attributes, AttributesData::default());
    }

    #[test]
    fn test_equipment_slot_type_field_name() {
        let slot = EquipmentSlotData {
            slot_type: "hand".to_string(),
            id: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["type"], "hand");
        assert_eq!(json["item-id"], "");
    }

    #[test]
    fn test_attributes_sum() {
        let attrs = AttributesData {
            str: 5,
            con: 4,
            dex: 3,
            int: 2,
            wis: 1,
        };
        assert_eq!(attrs.sum(), 15);
    }
}
