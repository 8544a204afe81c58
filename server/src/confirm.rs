//! Two-phase trade confirmations.
//!
//! A trade request never touches inventories. The router registers a
//! [`PendingConfirmation`] with the hub and the trade only executes once the
//! controller of the seller (or the AI, for sellers no user owns) accepts it.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use log::info;
use shared::request::Trade;
use shared::response;

use crate::error::RequestError;
use crate::router::transfer_items;
use crate::world::{ObjectKey, WorldState};

/// Trade waiting for the seller's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    pub id: u64,
    /// Client that sent the trade request.
    pub origin: SocketAddr,
    pub trade: Trade,
    /// Character whose controller must confirm.
    pub target: ObjectKey,
}

impl PendingConfirmation {
    pub fn new(id: u64, origin: SocketAddr, trade: Trade) -> Self {
        let (seller_id, seller_serial) = trade.seller();
        let target = ObjectKey::new(seller_id, seller_serial);
        Self {
            id,
            origin,
            trade,
            target,
        }
    }

    /// Trade description sent to both parties.
    pub fn view(&self) -> response::Trade {
        let (buyer_id, buyer_serial) = self.trade.buyer();
        response::Trade {
            id: self.id,
            buyer_id: buyer_id.to_string(),
            buyer_serial: buyer_serial.to_string(),
            seller_id: self.target.id.clone(),
            seller_serial: self.target.serial.clone(),
            items_buy: self.trade.buy.items.clone(),
            items_sell: self.trade.sell.items.clone(),
        }
    }
}

/// Source of confirmation IDs. IDs are never reused.
#[derive(Debug, Default)]
pub struct ConfirmationIds {
    next: u64,
}

impl ConfirmationIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Outcome of resolving a confirmation ID.
#[derive(Debug, PartialEq)]
pub enum Resolution {
    /// No pending confirmation with this ID.
    Unknown,
    /// Resolver does not control the confirmation target. The confirmation
    /// is discarded anyway.
    Unauthorized(PendingConfirmation),
    Authorized(PendingConfirmation),
}

#[derive(Debug, Default)]
pub struct ConfirmationRegistry {
    pending: BTreeMap<u64, PendingConfirmation>,
}

impl ConfirmationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, confirmation: PendingConfirmation) {
        info!(
            "Confirmation {}: registered: seller: {}",
            confirmation.id, confirmation.target
        );
        self.pending.insert(confirmation.id, confirmation);
    }

    pub fn get(&self, id: u64) -> Option<&PendingConfirmation> {
        self.pending.get(&id)
    }

    /// Removes the confirmation and checks the resolver with the specified
    /// predicate.
    pub fn resolve<F>(&mut self, id: u64, authorized: F) -> Resolution
    where
        F: FnOnce(&PendingConfirmation) -> bool,
    {
        match self.pending.remove(&id) {
            None => Resolution::Unknown,
            Some(confirmation) if authorized(&confirmation) => {
                Resolution::Authorized(confirmation)
            }
            Some(confirmation) => Resolution::Unauthorized(confirmation),
        }
    }

    /// Drops confirmations sent by the client with the specified address or
    /// targeting one of the specified characters. Returns the dropped IDs.
    pub fn reap(&mut self, origin: SocketAddr, targets: &[ObjectKey]) -> Vec<u64> {
        let reaped: Vec<u64> = self
            .pending
            .values()
            .filter(|c| c.origin == origin || targets.contains(&c.target))
            .map(|c| c.id)
            .collect();
        for id in &reaped {
            self.pending.remove(id);
        }
        reaped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Moves the bought items from the seller to the buyer, then the sold items
/// from the buyer to the seller.
///
/// Stops at the first missing item. Items moved before the failure stay
/// where they are.
pub fn execute_trade(state: &mut WorldState, trade: &Trade) -> Result<(), RequestError> {
    let (buyer_id, buyer_serial) = trade.buyer();
    let (seller_id, seller_serial) = trade.seller();
    let buyer = ObjectKey::new(buyer_id, buyer_serial);
    let seller = ObjectKey::new(seller_id, seller_serial);
    transfer_items(state, &seller, &buyer, &trade.buy.items)?;
    transfer_items(state, &buyer, &seller, &trade.sell.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::request::{ItemList, TransferItems};
    use shared::{AreaData, ChapterData, CharacterData, InventoryData, ItemData, ModuleData};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn items(list: &[(&str, &str)]) -> ItemList {
        let mut items = ItemList::new();
        for (id, serial) in list {
            items
                .entry(id.to_string())
                .or_insert_with(Vec::new)
                .push(serial.to_string());
        }
        items
    }

    fn trade(buy: &[(&str, &str)], sell: &[(&str, &str)]) -> Trade {
        Trade {
            buy: TransferItems {
                object_from_id: "merchant".to_string(),
                object_from_serial: "1".to_string(),
                object_to_id: "hero".to_string(),
                object_to_serial: "0".to_string(),
                items: items(buy),
            },
            sell: TransferItems {
                object_from_id: "hero".to_string(),
                object_from_serial: "0".to_string(),
                object_to_id: "merchant".to_string(),
                object_to_serial: "1".to_string(),
                items: items(sell),
            },
        }
    }

    fn character(id: &str, serial: &str, items: &[(&str, &str)]) -> CharacterData {
        CharacterData {
            id: id.to_string(),
            serial: serial.to_string(),
            health: 10,
            inventory: InventoryData {
                items: items
                    .iter()
                    .map(|(id, serial)| ItemData {
                        id: id.to_string(),
                        serial: serial.to_string(),
                        value: 10,
                        ..Default::default()
                    })
                    .collect(),
            },
            ..Default::default()
        }
    }

    fn state() -> WorldState {
        WorldState::import(&ModuleData {
            id: "test".to_string(),
            chapter: ChapterData {
                id: "ch1".to_string(),
                areas: vec![AreaData {
                    id: "town".to_string(),
                    characters: vec![
                        character("hero", "0", &[("gold", "10"), ("gold", "11")]),
                        character("merchant", "1", &[("sword", "20")]),
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut ids = ConfirmationIds::new();
        let mut registry = ConfirmationRegistry::new();
        let first = ids.next();
        let second = ids.next();
        registry.register(PendingConfirmation::new(first, addr(1), trade(&[], &[])));
        registry.register(PendingConfirmation::new(second, addr(1), trade(&[], &[])));

        registry.resolve(first, |_| true);
        let third = ids.next();

        assert_ne!(third, second);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(second).is_some());
    }

    #[test]
    fn test_resolve_always_removes() {
        let mut registry = ConfirmationRegistry::new();
        registry.register(PendingConfirmation::new(0, addr(1), trade(&[], &[])));
        registry.register(PendingConfirmation::new(1, addr(1), trade(&[], &[])));

        assert!(matches!(
            registry.resolve(0, |_| false),
            Resolution::Unauthorized(_)
        ));
        assert_eq!(registry.resolve(0, |_| true), Resolution::Unknown);
        assert!(matches!(
            registry.resolve(1, |c| c.target == ObjectKey::new("merchant", "1")),
            Resolution::Authorized(_)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reap() {
        let mut registry = ConfirmationRegistry::new();
        registry.register(PendingConfirmation::new(0, addr(1), trade(&[], &[])));
        registry.register(PendingConfirmation::new(1, addr(2), trade(&[], &[])));
        let mut other_seller = trade(&[], &[]);
        other_seller.buy.object_from_id = "smith".to_string();
        registry.register(PendingConfirmation::new(2, addr(2), other_seller));

        let reaped = registry.reap(addr(1), &[]);
        assert_eq!(reaped, vec![0]);

        let reaped = registry.reap(addr(3), &[ObjectKey::new("merchant", "1")]);
        assert_eq!(reaped, vec![1]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_view() {
        let confirmation = PendingConfirmation::new(
            7,
            addr(1),
            trade(&[("sword", "20")], &[("gold", "10")]),
        );
        let view = confirmation.view();

        assert_eq!(view.id, 7);
        assert_eq!(view.buyer_id, "hero");
        assert_eq!(view.seller_id, "merchant");
        assert_eq!(view.items_buy["sword"], vec!["20"]);
        assert_eq!(view.items_sell["gold"], vec!["10"]);
    }

    #[test]
    fn test_execute_trade() {
        let mut state = state();
        execute_trade(
            &mut state,
            &trade(&[("sword", "20")], &[("gold", "10"), ("gold", "11")]),
        )
        .unwrap();

        let hero = state.character("hero", "0").unwrap();
        let merchant = state.character("merchant", "1").unwrap();
        assert!(hero.inventory.item("sword", "20").is_some());
        assert!(hero.inventory.item("gold", "10").is_none());
        assert_eq!(merchant.inventory.len(), 2);
        assert!(merchant.inventory.item("sword", "20").is_none());
    }

    #[test]
    fn test_execute_trade_is_not_atomic() {
        let mut state = state();
        let result = execute_trade(
            &mut state,
            &trade(&[("sword", "20")], &[("gold", "10"), ("gold", "99")]),
        );

        assert_eq!(result, Err(RequestError::item_not_found("gold", "99")));
        let hero = state.character("hero", "0").unwrap();
        let merchant = state.character("merchant", "1").unwrap();
        // Bought item and the first sold item already moved.
        assert!(hero.inventory.item("sword", "20").is_some());
        assert!(merchant.inventory.item("gold", "10").is_some());
        assert!(hero.inventory.item("gold", "11").is_some());
    }

    #[test]
    fn test_execute_trade_missing_bought_item() {
        let mut state = state();
        let result = execute_trade(
            &mut state,
            &trade(&[("sword", "21")], &[("gold", "10")]),
        );

        assert_eq!(result, Err(RequestError::item_not_found("sword", "21")));
        let hero = state.character("hero", "0").unwrap();
        assert!(hero.inventory.item("gold", "10").is_some());
    }
}
