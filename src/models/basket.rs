use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-item notes are capped at this many characters.
pub const NOTE_MAX_CHARS: usize = 20;

pub type CatalogItemId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketLine {
    pub catalog_item_id: CatalogItemId,
    pub name: String,
    /// Whole kroner.
    pub price: i64,
    pub quantity: u32,
}

impl BasketLine {
    pub fn line_total(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: CatalogItemId,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    Decremented(u32),
    /// The line is at quantity 1; the caller must confirm and call `remove`.
    NeedsRemovalConfirmation,
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Basket {
    lines: Vec<BasketLine>,
    notes: BTreeMap<CatalogItemId, String>,
}

impl Basket {
    pub fn from_parts(lines: Vec<BasketLine>, notes: BTreeMap<CatalogItemId, String>) -> Self {
        let lines = lines
            .into_iter()
            .map(|mut line| {
                line.quantity = line.quantity.max(1);
                line
            })
            .collect();
        Self { lines, notes }
    }

    pub fn lines(&self) -> &[BasketLine] {
        &self.lines
    }

    pub fn notes(&self) -> &BTreeMap<CatalogItemId, String> {
        &self.notes
    }

    pub fn note(&self, id: CatalogItemId) -> Option<&str> {
        self.notes.get(&id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn add(&mut self, item: &MenuItem) -> u32 {
        if let Some(line) = self.line_mut(item.id) {
            line.quantity = line.quantity.saturating_add(1);
            return line.quantity;
        }

        self.lines.push(BasketLine {
            catalog_item_id: item.id,
            name: item.name.clone(),
            price: item.price,
            quantity: 1,
        });
        1
    }

    pub fn increment(&mut self, id: CatalogItemId) -> Option<u32> {
        let line = self.line_mut(id)?;
        line.quantity = line.quantity.saturating_add(1);
        Some(line.quantity)
    }

    pub fn decrement(&mut self, id: CatalogItemId) -> DecrementOutcome {
        match self.line_mut(id) {
            None => DecrementOutcome::NotFound,
            Some(line) if line.quantity <= 1 => DecrementOutcome::NeedsRemovalConfirmation,
            Some(line) => {
                line.quantity -= 1;
                DecrementOutcome::Decremented(line.quantity)
            }
        }
    }

    pub fn remove(&mut self, id: CatalogItemId) -> Option<BasketLine> {
        let index = self.lines.iter().position(|l| l.catalog_item_id == id)?;
        self.notes.remove(&id);
        Some(self.lines.remove(index))
    }

    /// Stores a note truncated to `NOTE_MAX_CHARS`; a blank note clears it.
    pub fn set_note(&mut self, id: CatalogItemId, note: &str) {
        let note: String = note.chars().take(NOTE_MAX_CHARS).collect();
        if note.trim().is_empty() {
            self.notes.remove(&id);
        } else {
            self.notes.insert(id, note);
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.notes.clear();
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn items_total(&self) -> i64 {
        self.lines.iter().map(BasketLine::line_total).sum()
    }

    fn line_mut(&mut self, id: CatalogItemId) -> Option<&mut BasketLine> {
        self.lines.iter_mut().find(|l| l.catalog_item_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Basket, DecrementOutcome, MenuItem};

    fn item(id: i64, price: i64) -> MenuItem {
        MenuItem {
            id,
            name: format!("item-{id}"),
            price,
        }
    }

    #[test]
    fn adding_twice_increments_quantity() {
        let mut basket = Basket::default();
        basket.add(&item(1, 50));
        assert_eq!(basket.add(&item(1, 50)), 2);
        assert_eq!(basket.lines().len(), 1);
        assert_eq!(basket.items_total(), 100);
    }

    #[test]
    fn decrement_stops_at_one() {
        let mut basket = Basket::default();
        basket.add(&item(1, 50));
        basket.increment(1);

        assert_eq!(basket.decrement(1), DecrementOutcome::Decremented(1));
        assert_eq!(basket.decrement(1), DecrementOutcome::NeedsRemovalConfirmation);
        assert_eq!(basket.lines()[0].quantity, 1);
        assert_eq!(basket.decrement(99), DecrementOutcome::NotFound);
    }

    #[test]
    fn remove_drops_line_and_note() {
        let mut basket = Basket::default();
        basket.add(&item(1, 50));
        basket.set_note(1, "no onions");
        basket.remove(1);

        assert!(basket.is_empty());
        assert!(basket.note(1).is_none());
    }

    #[test]
    fn note_is_truncated_to_twenty_chars() {
        let mut basket = Basket::default();
        basket.add(&item(1, 50));
        basket.set_note(1, "extra spicy with ærter please");
        assert_eq!(basket.note(1).unwrap().chars().count(), 20);

        basket.set_note(1, "   ");
        assert!(basket.note(1).is_none());
    }

    #[test]
    fn totals_follow_quantities() {
        let mut basket = Basket::default();
        basket.add(&item(1, 50));
        basket.add(&item(1, 50));
        basket.add(&item(2, 30));

        assert_eq!(basket.item_count(), 3);
        assert_eq!(basket.items_total(), 130);
    }
}
