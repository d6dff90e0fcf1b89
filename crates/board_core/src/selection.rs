//! Multi-select state for cards, single-column by construction.

use std::collections::HashSet;

use shared::domain::{CardId, ColumnId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    pub shift: bool,
    /// Ctrl on Linux/Windows, Cmd on macOS. Treated the same as a plain
    /// click: both toggle the clicked card.
    pub ctrl: bool,
}

impl ClickModifiers {
    pub fn shift() -> Self {
        Self {
            shift: true,
            ctrl: false,
        }
    }
}

/// Which cards are selected, plus the range anchor. Invariant: every
/// selected card lives in `anchor_column`; clicking into another column
/// resets the selection before selecting the clicked card.
///
/// The anchor is set by non-shift clicks and stays put across shift
/// clicks; a shift click selects the range base (the selection as of the
/// anchor-setting click) plus the inclusive index range between anchor and
/// click, so a second shift click narrows or extends the previous range.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    selected: HashSet<CardId>,
    range_base: HashSet<CardId>,
    anchor_column: Option<ColumnId>,
    anchor_index: Option<usize>,
}

impl SelectionState {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, id: &CardId) -> bool {
        self.selected.contains(id)
    }

    pub fn selected(&self) -> &HashSet<CardId> {
        &self.selected
    }

    pub fn anchor_column(&self) -> Option<&ColumnId> {
        self.anchor_column.as_ref()
    }

    /// Selected ids in the order they appear in `column_order`.
    pub fn ids_in_order(&self, column_order: &[CardId]) -> Vec<CardId> {
        column_order
            .iter()
            .filter(|id| self.selected.contains(id))
            .copied()
            .collect()
    }

    /// Handle a click on `card` within `column`, whose current card order
    /// is `column_order`.
    pub fn click(
        &mut self,
        column: &ColumnId,
        column_order: &[CardId],
        card: CardId,
        modifiers: ClickModifiers,
    ) {
        let Some(index) = column_order.iter().position(|id| *id == card) else {
            return;
        };

        if self
            .anchor_column
            .as_ref()
            .is_some_and(|anchor| anchor != column)
        {
            self.reset_to(column, index, card);
            return;
        }

        if modifiers.shift {
            if let Some(anchor_index) = self.anchor_index {
                let (lo, hi) = if anchor_index <= index {
                    (anchor_index, index)
                } else {
                    (index, anchor_index)
                };
                let mut next = self.range_base.clone();
                next.extend(column_order[lo..=hi].iter().copied());
                self.selected = next;
                self.anchor_column = Some(column.clone());
                return;
            }
        }

        // Plain or ctrl/cmd click: toggle membership of the clicked card.
        if !self.selected.insert(card) {
            self.selected.remove(&card);
        }
        if self.selected.is_empty() {
            self.clear();
        } else {
            self.anchor_column = Some(column.clone());
            self.anchor_index = Some(index);
            self.range_base = self.selected.clone();
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn reset_to(&mut self, column: &ColumnId, index: usize, card: CardId) {
        self.selected = HashSet::from([card]);
        self.range_base = self.selected.clone();
        self.anchor_column = Some(column.clone());
        self.anchor_index = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(n: usize) -> Vec<CardId> {
        (0..n).map(|_| CardId::new()).collect()
    }

    fn col(name: &str) -> ColumnId {
        ColumnId::from(name)
    }

    #[test]
    fn plain_click_toggles_single_card() {
        let order = cards(3);
        let column = col("queued");
        let mut selection = SelectionState::default();

        selection.click(&column, &order, order[1], ClickModifiers::default());
        assert!(selection.contains(&order[1]));
        assert_eq!(selection.len(), 1);

        selection.click(&column, &order, order[1], ClickModifiers::default());
        assert!(selection.is_empty());
        assert!(selection.anchor_column().is_none());
    }

    #[test]
    fn ctrl_click_behaves_like_plain_click() {
        let order = cards(3);
        let column = col("queued");
        let mut selection = SelectionState::default();
        let ctrl = ClickModifiers {
            ctrl: true,
            ..Default::default()
        };

        selection.click(&column, &order, order[0], ctrl);
        selection.click(&column, &order, order[2], ctrl);
        assert_eq!(selection.len(), 2);

        selection.click(&column, &order, order[0], ctrl);
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(&order[2]));
    }

    #[test]
    fn shift_click_selects_inclusive_range() {
        let order = cards(5);
        let column = col("queued");
        let mut selection = SelectionState::default();

        selection.click(&column, &order, order[0], ClickModifiers::default());
        selection.click(&column, &order, order[3], ClickModifiers::shift());

        let selected = selection.ids_in_order(&order);
        assert_eq!(selected, order[0..=3].to_vec());
    }

    #[test]
    fn second_shift_click_narrows_previous_range() {
        let order = cards(5);
        let column = col("queued");
        let mut selection = SelectionState::default();

        selection.click(&column, &order, order[0], ClickModifiers::default());
        selection.click(&column, &order, order[3], ClickModifiers::shift());
        selection.click(&column, &order, order[1], ClickModifiers::shift());

        assert_eq!(selection.ids_in_order(&order), order[0..=1].to_vec());
    }

    #[test]
    fn shift_range_adds_to_toggle_built_selection() {
        let order = cards(6);
        let column = col("queued");
        let mut selection = SelectionState::default();

        selection.click(&column, &order, order[5], ClickModifiers::default());
        selection.click(&column, &order, order[0], ClickModifiers::default());
        selection.click(&column, &order, order[2], ClickModifiers::shift());

        let selected = selection.ids_in_order(&order);
        assert_eq!(selected, vec![order[0], order[1], order[2], order[5]]);
    }

    #[test]
    fn reversed_shift_range_uses_min_max_bounds() {
        let order = cards(5);
        let column = col("queued");
        let mut selection = SelectionState::default();

        selection.click(&column, &order, order[4], ClickModifiers::default());
        selection.click(&column, &order, order[2], ClickModifiers::shift());

        assert_eq!(selection.ids_in_order(&order), order[2..=4].to_vec());
    }

    #[test]
    fn clicking_another_column_resets_selection() {
        let order_a = cards(3);
        let order_b = cards(3);
        let mut selection = SelectionState::default();

        selection.click(&col("queued"), &order_a, order_a[0], ClickModifiers::default());
        selection.click(&col("queued"), &order_a, order_a[2], ClickModifiers::default());
        assert_eq!(selection.len(), 2);

        selection.click(&col("milling"), &order_b, order_b[1], ClickModifiers::default());
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(&order_b[1]));
        assert_eq!(selection.anchor_column(), Some(&col("milling")));
    }

    #[test]
    fn cross_column_shift_click_also_resets() {
        let order_a = cards(3);
        let order_b = cards(3);
        let mut selection = SelectionState::default();

        selection.click(&col("queued"), &order_a, order_a[0], ClickModifiers::default());
        selection.click(&col("milling"), &order_b, order_b[2], ClickModifiers::shift());

        assert_eq!(selection.len(), 1);
        assert!(selection.contains(&order_b[2]));
    }

    #[test]
    fn shift_click_without_anchor_toggles() {
        let order = cards(3);
        let column = col("queued");
        let mut selection = SelectionState::default();

        selection.click(&column, &order, order[2], ClickModifiers::shift());
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(&order[2]));
    }
}
