//! Items, inventories and character equipment.

use shared::{EffectData, EquipmentSlotData, InventoryData, ItemData};

use super::ObjectKey;

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub serial: String,
    pub value: i64,
    /// Slot types the item must occupy when equipped.
    pub slots: Vec<String>,
    pub effect: Option<EffectData>,
    pub consumable: bool,
}

impl Item {
    pub fn from_data(data: &ItemData) -> Self {
        Self {
            id: data.id.clone(),
            serial: data.serial.clone(),
            value: data.value,
            slots: data.slots.clone(),
            effect: data.effect,
            consumable: data.consumable,
        }
    }

    pub fn to_data(&self) -> ItemData {
        ItemData {
            id: self.id.clone(),
            serial: self.serial.clone(),
            value: self.value,
            slots: self.slots.clone(),
            effect: self.effect,
            consumable: self.consumable,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.id, &self.serial)
    }

    pub fn is(&self, id: &str, serial: &str) -> bool {
        self.id == id && self.serial == serial
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    items: Vec<Item>,
}

impl Inventory {
    pub fn from_data(data: &InventoryData) -> Self {
        Self {
            items: data.items.iter().map(Item::from_data).collect(),
        }
    }

    pub fn to_data(&self) -> InventoryData {
        InventoryData {
            items: self.items.iter().map(Item::to_data).collect(),
        }
    }

    pub fn item(&self, id: &str, serial: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.is(id, serial))
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.items.iter_mut()
    }

    pub fn add(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Removes and returns the item with the specified ID and serial.
    pub fn take(&mut self, id: &str, serial: &str) -> Option<Item> {
        let index = self.items.iter().position(|i| i.is(id, serial))?;
        Some(self.items.remove(index))
    }

    /// Total value of the listed items that are present in this inventory.
    pub fn value_of<'a, I>(&self, refs: I) -> i64
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        refs.into_iter()
            .filter_map(|(id, serial)| self.item(id, serial))
            .map(|i| i.value)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentSlot {
    pub slot_type: String,
    pub id: u32,
    pub item: Option<ObjectKey>,
}

/// Reasons an equip attempt fails.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EquipError {
    #[error("item already equipped: {0}")]
    AlreadyEquipped(ObjectKey),
    #[error("equipment slot not found: {slot_type} {id}")]
    SlotNotFound { slot_type: String, id: u32 },
    #[error("equipment slot occupied: {slot_type} {id}")]
    SlotOccupied { slot_type: String, id: u32 },
    #[error("item does not fit all required slots: {0}")]
    SlotsIncomplete(ObjectKey),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Equipment {
    slots: Vec<EquipmentSlot>,
}

impl Equipment {
    pub fn from_data(data: &[EquipmentSlotData]) -> Self {
        let slots = data
            .iter()
            .map(|s| EquipmentSlot {
                slot_type: s.slot_type.clone(),
                id: s.id,
                item: (!s.item_id.is_empty()).then(|| ObjectKey::new(&s.item_id, &s.item_serial)),
            })
            .collect();
        Self { slots }
    }

    pub fn to_data(&self) -> Vec<EquipmentSlotData> {
        self.slots
            .iter()
            .map(|s| EquipmentSlotData {
                slot_type: s.slot_type.clone(),
                id: s.id,
                item_id: s.item.as_ref().map(|k| k.id.clone()).unwrap_or_default(),
                item_serial: s.item.as_ref().map(|k| k.serial.clone()).unwrap_or_default(),
            })
            .collect()
    }

    pub fn slots(&self) -> &[EquipmentSlot] {
        &self.slots
    }

    pub fn equipped(&self, item: &ObjectKey) -> bool {
        self.slots.iter().any(|s| s.item.as_ref() == Some(item))
    }

    /// Seats the item in the requested slots. Afterwards every slot type the
    /// item requires must hold it, otherwise the equip is rolled back.
    pub fn equip(&mut self, item: &Item, requested: &[(String, u32)]) -> Result<(), EquipError> {
        let key = item.key();
        if self.equipped(&key) {
            return Err(EquipError::AlreadyEquipped(key));
        }
        for (slot_type, id) in requested {
            let found = self
                .slots
                .iter()
                .position(|s| &s.slot_type == slot_type && s.id == *id);
            let Some(index) = found else {
                self.unequip(&key);
                return Err(EquipError::SlotNotFound {
                    slot_type: slot_type.clone(),
                    id: *id,
                });
            };
            if self.slots[index].item.is_some() {
                self.unequip(&key);
                return Err(EquipError::SlotOccupied {
                    slot_type: slot_type.clone(),
                    id: *id,
                });
            }
            self.slots[index].item = Some(key.clone());
        }
        let complete = !item.slots.is_empty()
            && item.slots.iter().all(|required| {
                self.slots
                    .iter()
                    .any(|s| &s.slot_type == required && s.item.as_ref() == Some(&key))
            });
        if !complete {
            self.unequip(&key);
            return Err(EquipError::SlotsIncomplete(key));
        }
        Ok(())
    }

    /// Removes the item from all slots. Returns false if it was not equipped.
    pub fn unequip(&mut self, item: &ObjectKey) -> bool {
        let mut removed = false;
        for slot in self.slots.iter_mut() {
            if slot.item.as_ref() == Some(item) {
                slot.item = None;
                removed = true;
            }
        }
        removed
    }
}
