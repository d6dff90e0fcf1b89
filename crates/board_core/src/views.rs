//! Derived read views over the shared card/column collections.
//!
//! Groupings are recomputed from the flat collections on demand; nothing
//! here holds references between cards and columns.

use chrono::{DateTime, Duration, Utc};
use shared::domain::{Card, Column, ColumnId};

/// Cards in the terminal column older than this many hours are hidden;
/// there is no "show all" affordance.
const TERMINAL_COLUMN_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardSort {
    #[default]
    BoardOrder,
    Assignee,
    Process,
}

/// Whether `id` is the terminal ("Done") stage: the column at the highest
/// position. Derived, never stored.
pub fn is_last_column(columns: &[Column], id: &ColumnId) -> bool {
    columns.last().map(|c| &c.id == id).unwrap_or(false)
}

pub fn cards_in_column<'a>(cards: &'a [Card], column_id: &ColumnId) -> Vec<&'a Card> {
    cards.iter().filter(|c| &c.column_id == column_id).collect()
}

/// The cards displayed for a column: grouped by foreign key, time-filtered
/// in the terminal column, optionally re-sorted.
pub fn visible_cards_in_column<'a>(
    cards: &'a [Card],
    columns: &[Column],
    column_id: &ColumnId,
    sort: CardSort,
    now: DateTime<Utc>,
) -> Vec<&'a Card> {
    let mut grouped = cards_in_column(cards, column_id);
    if is_last_column(columns, column_id) {
        let cutoff = now - Duration::hours(TERMINAL_COLUMN_WINDOW_HOURS);
        grouped.retain(|c| c.updated_at >= cutoff);
    }
    match sort {
        CardSort::BoardOrder => {}
        CardSort::Assignee => grouped.sort_by(|a, b| a.assignee.cmp(&b.assignee)),
        CardSort::Process => {
            grouped.sort_by(|a, b| a.process_ids.first().cmp(&b.process_ids.first()))
        }
    }
    grouped
}

/// Reassign dense 0..n-1 positions following the current vector order.
pub fn normalize_positions(columns: &mut [Column]) {
    for (index, column) in columns.iter_mut().enumerate() {
        column.position = index as u32;
    }
}

/// Order columns by their persisted position, for configs arriving from
/// elsewhere.
pub fn sort_by_position(columns: &mut [Column]) {
    columns.sort_by_key(|c| c.position);
}
