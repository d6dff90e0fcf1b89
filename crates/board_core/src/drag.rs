//! Drag gesture state machine and move-intent classification.
//!
//! A pointer-down only arms a pending drag; it becomes active once the
//! pointer travels past the activation threshold, so plain clicks never
//! turn into drags. Intent classification happens exactly once, at drop.

use shared::domain::{Card, CardId, Column, ColumnId};

use crate::selection::SelectionState;

/// Movement past this distance (logical pixels, per axis) turns a pending
/// gesture into an active drag.
pub const DRAG_ACTIVATION_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragItem {
    Card(CardId),
    Column(ColumnId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Card(CardId),
    Column(ColumnId),
}

/// What a completed gesture means, resolved once at drop time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveIntent {
    MoveColumn {
        column_id: ColumnId,
        target_index: usize,
    },
    MoveCard {
        card_id: CardId,
        target_column_id: ColumnId,
    },
    MoveCardGroup {
        card_ids: Vec<CardId>,
        target_column_id: ColumnId,
    },
}

#[derive(Debug, Default)]
pub struct DragState {
    pending: Option<PendingDrag>,
    active: Option<DragItem>,
}

#[derive(Debug)]
struct PendingDrag {
    item: DragItem,
    start_x: f32,
    start_y: f32,
}

impl DragState {
    pub fn pointer_down(&mut self, item: DragItem, x: f32, y: f32) {
        self.active = None;
        self.pending = Some(PendingDrag {
            item,
            start_x: x,
            start_y: y,
        });
    }

    /// Returns whether a drag is active after this movement.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        if self.active.is_some() {
            return true;
        }
        if let Some(pending) = &self.pending {
            let dx = (x - pending.start_x).abs();
            let dy = (y - pending.start_y).abs();
            if dx > DRAG_ACTIVATION_DISTANCE || dy > DRAG_ACTIVATION_DISTANCE {
                self.active = Some(pending.item.clone());
            }
        }
        self.active.is_some()
    }

    pub fn dragging(&self) -> Option<&DragItem> {
        self.active.as_ref()
    }

    /// Clears all transient drag state and returns the item that was being
    /// dragged, if the gesture had passed the activation threshold. Called
    /// on every gesture end, before any mutation is dispatched.
    pub fn finish(&mut self) -> Option<DragItem> {
        self.pending = None;
        self.active.take()
    }
}

/// Classify a completed drag into at most one intent.
///
/// Dropping onto a card resolves to that card's current column. Column
/// drags outside edit mode and same-column drops produce no intent. A
/// dragged card expands to the whole selection, in column order, when it
/// is part of a multi-card selection anchored in its own column.
pub fn resolve_intent(
    cards: &[Card],
    columns: &[Column],
    selection: &SelectionState,
    item: &DragItem,
    target: Option<&DropTarget>,
    edit_mode: bool,
) -> Option<MoveIntent> {
    let target_column = resolve_target_column(cards, columns, target?)?;

    match item {
        DragItem::Column(column_id) => {
            if !edit_mode {
                return None;
            }
            let from = columns.iter().position(|c| &c.id == column_id)?;
            let to = columns.iter().position(|c| c.id == target_column)?;
            if from == to {
                return None;
            }
            Some(MoveIntent::MoveColumn {
                column_id: column_id.clone(),
                target_index: to,
            })
        }
        DragItem::Card(card_id) => {
            let card = cards.iter().find(|c| &c.id == card_id)?;
            if card.column_id == target_column {
                return None;
            }
            let grouped = selection.contains(card_id)
                && selection.anchor_column() == Some(&card.column_id)
                && selection.len() > 1;
            if grouped {
                let order: Vec<CardId> = cards
                    .iter()
                    .filter(|c| c.column_id == card.column_id)
                    .map(|c| c.id)
                    .collect();
                Some(MoveIntent::MoveCardGroup {
                    card_ids: selection.ids_in_order(&order),
                    target_column_id: target_column,
                })
            } else {
                Some(MoveIntent::MoveCard {
                    card_id: *card_id,
                    target_column_id: target_column,
                })
            }
        }
    }
}

fn resolve_target_column(
    cards: &[Card],
    columns: &[Column],
    target: &DropTarget,
) -> Option<ColumnId> {
    match target {
        DropTarget::Column(id) => columns.iter().find(|c| &c.id == id).map(|c| c.id.clone()),
        DropTarget::Card(id) => cards.iter().find(|c| c.id == *id).map(|c| c.column_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::ClickModifiers;
    use chrono::Utc;

    fn card(column: &str) -> Card {
        let now = Utc::now();
        Card {
            id: CardId::new(),
            column_id: ColumnId::from(column),
            title: "bracket".to_string(),
            assignee: None,
            machine: None,
            due_date: None,
            process_ids: Vec::new(),
            quantity_per_robot: None,
            quantity_to_make: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn columns(names: &[&str]) -> Vec<Column> {
        names
            .iter()
            .enumerate()
            .map(|(position, name)| Column {
                id: ColumnId::from(*name),
                title: name.to_string(),
                position: position as u32,
            })
            .collect()
    }

    #[test]
    fn click_without_movement_never_activates() {
        let mut drag = DragState::default();
        let id = CardId::new();
        drag.pointer_down(DragItem::Card(id), 10.0, 10.0);
        assert!(!drag.pointer_move(12.0, 11.0));
        assert!(drag.dragging().is_none());
        assert!(drag.finish().is_none());
    }

    #[test]
    fn movement_past_threshold_activates_and_finish_clears() {
        let mut drag = DragState::default();
        let id = CardId::new();
        drag.pointer_down(DragItem::Card(id), 10.0, 10.0);
        assert!(drag.pointer_move(20.0, 10.0));
        assert_eq!(drag.dragging(), Some(&DragItem::Card(id)));

        assert_eq!(drag.finish(), Some(DragItem::Card(id)));
        assert!(drag.dragging().is_none());
        assert!(drag.finish().is_none());
    }

    #[test]
    fn drop_on_card_resolves_to_its_column() {
        let columns = columns(&["queued", "milling"]);
        let dragged = card("queued");
        let target = card("milling");
        let cards = vec![dragged.clone(), target.clone()];

        let intent = resolve_intent(
            &cards,
            &columns,
            &SelectionState::default(),
            &DragItem::Card(dragged.id),
            Some(&DropTarget::Card(target.id)),
            false,
        );
        assert_eq!(
            intent,
            Some(MoveIntent::MoveCard {
                card_id: dragged.id,
                target_column_id: ColumnId::from("milling"),
            })
        );
    }

    #[test]
    fn same_column_drop_is_no_op() {
        let columns = columns(&["queued", "milling"]);
        let dragged = card("queued");
        let cards = vec![dragged.clone()];

        let intent = resolve_intent(
            &cards,
            &columns,
            &SelectionState::default(),
            &DragItem::Card(dragged.id),
            Some(&DropTarget::Column(ColumnId::from("queued"))),
            false,
        );
        assert_eq!(intent, None);
    }

    #[test]
    fn drop_on_nothing_is_no_op() {
        let columns = columns(&["queued"]);
        let dragged = card("queued");
        let cards = vec![dragged.clone()];

        let intent = resolve_intent(
            &cards,
            &columns,
            &SelectionState::default(),
            &DragItem::Card(dragged.id),
            None,
            false,
        );
        assert_eq!(intent, None);
    }

    #[test]
    fn selected_card_expands_to_group_in_column_order() {
        let columns = columns(&["queued", "milling"]);
        let cards = vec![card("queued"), card("queued"), card("queued")];
        let order: Vec<CardId> = cards.iter().map(|c| c.id).collect();

        let mut selection = SelectionState::default();
        let queued = ColumnId::from("queued");
        selection.click(&queued, &order, order[2], ClickModifiers::default());
        selection.click(&queued, &order, order[0], ClickModifiers::default());

        let intent = resolve_intent(
            &cards,
            &columns,
            &selection,
            &DragItem::Card(order[2]),
            Some(&DropTarget::Column(ColumnId::from("milling"))),
            false,
        );
        assert_eq!(
            intent,
            Some(MoveIntent::MoveCardGroup {
                card_ids: vec![order[0], order[2]],
                target_column_id: ColumnId::from("milling"),
            })
        );
    }

    #[test]
    fn unselected_card_moves_alone_despite_active_selection() {
        let columns = columns(&["queued", "milling"]);
        let cards = vec![card("queued"), card("queued"), card("queued")];
        let order: Vec<CardId> = cards.iter().map(|c| c.id).collect();

        let mut selection = SelectionState::default();
        let queued = ColumnId::from("queued");
        selection.click(&queued, &order, order[0], ClickModifiers::default());
        selection.click(&queued, &order, order[1], ClickModifiers::default());

        let intent = resolve_intent(
            &cards,
            &columns,
            &selection,
            &DragItem::Card(order[2]),
            Some(&DropTarget::Column(ColumnId::from("milling"))),
            false,
        );
        assert_eq!(
            intent,
            Some(MoveIntent::MoveCard {
                card_id: order[2],
                target_column_id: ColumnId::from("milling"),
            })
        );
    }

    #[test]
    fn column_reorder_requires_edit_mode() {
        let columns = columns(&["queued", "milling", "done"]);

        let without_edit = resolve_intent(
            &[],
            &columns,
            &SelectionState::default(),
            &DragItem::Column(ColumnId::from("queued")),
            Some(&DropTarget::Column(ColumnId::from("done"))),
            false,
        );
        assert_eq!(without_edit, None);

        let with_edit = resolve_intent(
            &[],
            &columns,
            &SelectionState::default(),
            &DragItem::Column(ColumnId::from("queued")),
            Some(&DropTarget::Column(ColumnId::from("done"))),
            true,
        );
        assert_eq!(
            with_edit,
            Some(MoveIntent::MoveColumn {
                column_id: ColumnId::from("queued"),
                target_index: 2,
            })
        );
    }

    #[test]
    fn column_dropped_on_itself_is_no_op() {
        let columns = columns(&["queued", "milling"]);
        let intent = resolve_intent(
            &[],
            &columns,
            &SelectionState::default(),
            &DragItem::Column(ColumnId::from("queued")),
            Some(&DropTarget::Column(ColumnId::from("queued"))),
            true,
        );
        assert_eq!(intent, None);
    }
}
