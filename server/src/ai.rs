//! Decisions for characters no user controls.

use log::debug;
use shared::request::{ItemList, Trade};

use crate::world::inventory::Inventory;
use crate::world::WorldState;

fn list_value(inventory: &Inventory, items: &ItemList) -> i64 {
    inventory.value_of(
        items
            .iter()
            .flat_map(|(id, serials)| serials.iter().map(move |s| (id.as_str(), s.as_str()))),
    )
}

/// Checks if the seller should accept the trade.
///
/// The buyer's offered items must be worth at least the requested items.
/// Items missing from an inventory count as worthless.
pub fn accepts_trade(state: &WorldState, trade: &Trade) -> bool {
    let (buyer_id, buyer_serial) = trade.buyer();
    let (seller_id, seller_serial) = trade.seller();
    let (Some(buyer), Some(seller)) = (
        state.character(buyer_id, buyer_serial),
        state.character(seller_id, seller_serial),
    ) else {
        return false;
    };
    let requested = list_value(&seller.inventory, &trade.buy.items);
    let offered = list_value(&buyer.inventory, &trade.sell.items);
    debug!(
        "AI: trade for {} {}: offered: {}, requested: {}",
        seller_id, seller_serial, offered, requested
    );
    offered >= requested
}
