//! Headless interaction engine for the manufacturing tracking board.
//!
//! `BoardClient` owns the shared card/column collections and is their only
//! writer: card mutations go through the optimistic snapshot/rollback
//! protocol, structural column edits through the debounced autosave.
//! Consumers subscribe to [`BoardEvent`]s and read derived views.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use shared::domain::{BoardConfig, Card, CardId, Column, ColumnId};
use shared::protocol::{CardPatch, NewCard};

pub mod api;
pub mod autosave;
pub mod drag;
pub mod error;
pub mod selection;
pub mod views;

use api::BoardApi;
use autosave::{column_id_for_title, DebounceTimer};
use drag::{DragItem, DragState, DropTarget, MoveIntent};
use error::BoardError;
use selection::{ClickModifiers, SelectionState};
use views::CardSort;

pub const DEFAULT_AUTOSAVE_QUIET_PERIOD: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub enum BoardEvent {
    CardsChanged,
    ColumnsChanged,
    SelectionChanged,
    Notification(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A dismissible user-facing notification.
#[derive(Debug, Clone)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

/// One field change fanned out over the current selection.
#[derive(Debug, Clone)]
pub enum BulkEdit {
    Assignee(Option<String>),
    Machine(String),
    Column(ColumnId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutcome {
    pub total: usize,
    pub failed: usize,
}

pub struct BoardClientOptions {
    pub server_url: String,
    pub autosave_quiet_period: Duration,
}

impl BoardClientOptions {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            autosave_quiet_period: DEFAULT_AUTOSAVE_QUIET_PERIOD,
        }
    }
}

struct BoardState {
    cards: Vec<Card>,
    columns: Vec<Column>,
    selection: SelectionState,
    drag: DragState,
    edit_mode: bool,
    cards_stale: bool,
    columns_stale: bool,
    refetch_task: Option<JoinHandle<()>>,
    autosave_timer: DebounceTimer,
    /// Serialization of the config this client last persisted or synced,
    /// used to tell an external update apart from our own write echoing
    /// back.
    last_synced_config: Option<String>,
}

pub struct BoardClient {
    api: BoardApi,
    quiet_period: Duration,
    inner: Mutex<BoardState>,
    events: broadcast::Sender<BoardEvent>,
}

impl BoardClient {
    pub fn new(options: BoardClientOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api: BoardApi::new(options.server_url),
            quiet_period: options.autosave_quiet_period,
            inner: Mutex::new(BoardState {
                cards: Vec::new(),
                columns: Vec::new(),
                selection: SelectionState::default(),
                drag: DragState::default(),
                edit_mode: false,
                cards_stale: true,
                columns_stale: true,
                refetch_task: None,
                autosave_timer: DebounceTimer::new(),
                last_synced_config: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    // ---- reads ---------------------------------------------------------

    pub async fn cards(&self) -> Vec<Card> {
        self.inner.lock().await.cards.clone()
    }

    pub async fn columns(&self) -> Vec<Column> {
        self.inner.lock().await.columns.clone()
    }

    pub async fn selection(&self) -> SelectionState {
        self.inner.lock().await.selection.clone()
    }

    pub async fn dragging(&self) -> Option<DragItem> {
        self.inner.lock().await.drag.dragging().cloned()
    }

    pub async fn edit_mode(&self) -> bool {
        self.inner.lock().await.edit_mode
    }

    /// Cards displayed for one column: derived grouping, terminal-column
    /// time filter, optional re-sort.
    pub async fn column_cards(&self, column_id: &ColumnId, sort: CardSort) -> Vec<Card> {
        let state = self.inner.lock().await;
        views::visible_cards_in_column(
            &state.cards,
            &state.columns,
            column_id,
            sort,
            chrono::Utc::now(),
        )
        .into_iter()
        .cloned()
        .collect()
    }

    // ---- loading and cache invalidation --------------------------------

    /// Fetch both collections from the server and replace local state.
    pub async fn refresh(&self) -> Result<(), BoardError> {
        let config = self.api.fetch_config().await?;
        let cards = self.api.fetch_cards().await?;
        {
            let mut state = self.inner.lock().await;
            state.columns = config.columns;
            views::sort_by_position(&mut state.columns);
            views::normalize_positions(&mut state.columns);
            state.last_synced_config = config_fingerprint(&state.columns);
            state.cards = cards;
            state.cards_stale = false;
            state.columns_stale = false;
        }
        let _ = self.events.send(BoardEvent::ColumnsChanged);
        let _ = self.events.send(BoardEvent::CardsChanged);
        Ok(())
    }

    /// Read the card collection, refetching first if a settled mutation
    /// has invalidated it.
    pub async fn ensure_fresh_cards(&self) -> Result<Vec<Card>, BoardError> {
        let stale = self.inner.lock().await.cards_stale;
        if stale {
            let cards = self.api.fetch_cards().await?;
            let mut state = self.inner.lock().await;
            state.cards = cards;
            state.cards_stale = false;
            drop(state);
            let _ = self.events.send(BoardEvent::CardsChanged);
        }
        Ok(self.inner.lock().await.cards.clone())
    }

    /// Read the column list, resyncing from the server only when a failed
    /// persist left it diverged. Columns and cards are invalidated
    /// independently.
    pub async fn ensure_fresh_columns(&self) -> Result<Vec<Column>, BoardError> {
        let stale = self.inner.lock().await.columns_stale;
        if stale {
            let config = self.api.fetch_config().await?;
            {
                let mut state = self.inner.lock().await;
                state.columns = config.columns;
                views::sort_by_position(&mut state.columns);
                views::normalize_positions(&mut state.columns);
                state.last_synced_config = config_fingerprint(&state.columns);
                state.columns_stale = false;
            }
            let _ = self.events.send(BoardEvent::ColumnsChanged);
        }
        Ok(self.inner.lock().await.columns.clone())
    }

    fn spawn_cards_refetch(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            match client.api.fetch_cards().await {
                Ok(cards) => {
                    {
                        let mut state = client.inner.lock().await;
                        state.cards = cards;
                        state.cards_stale = false;
                        state.refetch_task = None;
                    }
                    let _ = client.events.send(BoardEvent::CardsChanged);
                }
                Err(err) => {
                    warn!(error = %err, "background card refetch failed");
                    let mut state = client.inner.lock().await;
                    state.refetch_task = None;
                }
            }
        })
    }

    async fn schedule_cards_refetch(self: &Arc<Self>) {
        let task = self.spawn_cards_refetch();
        let mut state = self.inner.lock().await;
        if let Some(previous) = state.refetch_task.replace(task) {
            previous.abort();
        }
    }

    // ---- selection -----------------------------------------------------

    pub async fn click_card(
        &self,
        card_id: CardId,
        modifiers: ClickModifiers,
    ) -> Result<(), BoardError> {
        {
            let mut state = self.inner.lock().await;
            let column_id = match state.cards.iter().find(|c| c.id == card_id) {
                Some(card) => card.column_id.clone(),
                None => return Err(BoardError::Validation(format!("unknown card {card_id}"))),
            };
            let order: Vec<CardId> = state
                .cards
                .iter()
                .filter(|c| c.column_id == column_id)
                .map(|c| c.id)
                .collect();
            state.selection.click(&column_id, &order, card_id, modifiers);
        }
        let _ = self.events.send(BoardEvent::SelectionChanged);
        Ok(())
    }

    pub async fn clear_selection(&self) {
        {
            let mut state = self.inner.lock().await;
            if state.selection.is_empty() {
                return;
            }
            state.selection.clear();
        }
        let _ = self.events.send(BoardEvent::SelectionChanged);
    }

    // ---- drag gestures -------------------------------------------------

    pub async fn pointer_down(&self, item: DragItem, x: f32, y: f32) {
        self.inner.lock().await.drag.pointer_down(item, x, y);
    }

    /// Returns whether a drag is active after this movement.
    pub async fn pointer_move(&self, x: f32, y: f32) -> bool {
        self.inner.lock().await.drag.pointer_move(x, y)
    }

    pub async fn cancel_drag(&self) {
        self.inner.lock().await.drag.finish();
    }

    /// Complete a drag gesture. The transient drag state is cleared before
    /// any mutation is dispatched; the classified intent (if any) is then
    /// routed to the card mutation path or the column autosave path.
    pub async fn drop_gesture(
        self: &Arc<Self>,
        target: Option<DropTarget>,
    ) -> Result<Option<MoveIntent>, BoardError> {
        let intent = {
            let mut state = self.inner.lock().await;
            let item = state.drag.finish();
            match item {
                Some(item) => drag::resolve_intent(
                    &state.cards,
                    &state.columns,
                    &state.selection,
                    &item,
                    target.as_ref(),
                    state.edit_mode,
                ),
                None => None,
            }
        };

        match &intent {
            None => {}
            Some(MoveIntent::MoveCard {
                card_id,
                target_column_id,
            }) => {
                self.move_cards(vec![*card_id], target_column_id.clone())
                    .await?;
            }
            Some(MoveIntent::MoveCardGroup {
                card_ids,
                target_column_id,
            }) => {
                self.move_cards(card_ids.clone(), target_column_id.clone())
                    .await?;
            }
            Some(MoveIntent::MoveColumn {
                column_id,
                target_index,
            }) => {
                self.reorder_column(column_id, *target_index).await?;
            }
        }
        Ok(intent)
    }

    // ---- optimistic card mutations -------------------------------------

    pub async fn move_card(
        self: &Arc<Self>,
        card_id: CardId,
        target: ColumnId,
    ) -> Result<(), BoardError> {
        self.move_cards(vec![card_id], target).await
    }

    /// Move a set of cards to `target` as one mutation: the whole set is
    /// applied optimistically and rolled back together if any per-card
    /// request fails.
    pub async fn move_cards(
        self: &Arc<Self>,
        card_ids: Vec<CardId>,
        target: ColumnId,
    ) -> Result<(), BoardError> {
        if card_ids.is_empty() {
            return Err(BoardError::Validation("no cards to move".to_string()));
        }

        let snapshot = {
            let mut state = self.inner.lock().await;
            if state.columns.iter().all(|c| c.id != target) {
                return Err(BoardError::Validation(format!("unknown column {target}")));
            }
            for id in &card_ids {
                if state.cards.iter().all(|c| c.id != *id) {
                    return Err(BoardError::Validation(format!("unknown card {id}")));
                }
            }
            if state
                .cards
                .iter()
                .filter(|c| card_ids.contains(&c.id))
                .all(|c| c.column_id == target)
            {
                return Ok(());
            }

            // A stale read must never overwrite the speculative write:
            // stop any in-flight refetch before taking the snapshot.
            if let Some(task) = state.refetch_task.take() {
                task.abort();
            }
            let snapshot = state.cards.clone();
            for card in state.cards.iter_mut().filter(|c| card_ids.contains(&c.id)) {
                card.column_id = target.clone();
            }
            snapshot
        };
        let _ = self.events.send(BoardEvent::CardsChanged);
        debug!(count = card_ids.len(), target = %target, "optimistic card move applied");

        let results = join_all(
            card_ids
                .iter()
                .map(|id| self.api.move_card(*id, &target)),
        )
        .await;

        if let Some(err) = results.into_iter().find_map(Result::err) {
            self.rollback_cards(snapshot).await;
            self.notify_error(format!("Move failed: {}", err.user_message()));
            return Err(err);
        }

        let selection_cleared = {
            let mut state = self.inner.lock().await;
            state.cards_stale = true;
            let touched = card_ids.iter().any(|id| state.selection.contains(id));
            if touched {
                state.selection.clear();
            }
            touched
        };
        if selection_cleared {
            let _ = self.events.send(BoardEvent::SelectionChanged);
        }
        self.schedule_cards_refetch().await;
        Ok(())
    }

    /// Apply a field patch to one card with immediate local effect.
    pub async fn update_card(
        self: &Arc<Self>,
        card_id: CardId,
        patch: CardPatch,
    ) -> Result<(), BoardError> {
        if patch.is_empty() {
            return Err(BoardError::Validation("no fields to update".to_string()));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(BoardError::Validation("title cannot be empty".to_string()));
        }

        let snapshot = {
            let mut state = self.inner.lock().await;
            if let Some(column_id) = &patch.column_id {
                if state.columns.iter().all(|c| &c.id != column_id) {
                    return Err(BoardError::Validation(format!(
                        "unknown column {column_id}"
                    )));
                }
            }
            if state.cards.iter().all(|c| c.id != card_id) {
                return Err(BoardError::Validation(format!("unknown card {card_id}")));
            }
            if let Some(task) = state.refetch_task.take() {
                task.abort();
            }
            let snapshot = state.cards.clone();
            if let Some(card) = state.cards.iter_mut().find(|c| c.id == card_id) {
                apply_patch(card, &patch);
            }
            snapshot
        };
        let _ = self.events.send(BoardEvent::CardsChanged);

        match self.api.patch_card(card_id, &patch).await {
            Ok(_) => {
                self.inner.lock().await.cards_stale = true;
                self.schedule_cards_refetch().await;
                Ok(())
            }
            Err(err) => {
                self.rollback_cards(snapshot).await;
                self.notify_error(format!("Update failed: {}", err.user_message()));
                Err(err)
            }
        }
    }

    pub async fn create_card(self: &Arc<Self>, card: NewCard) -> Result<Card, BoardError> {
        if card.title.trim().is_empty() {
            return Err(BoardError::Validation("title cannot be empty".to_string()));
        }
        {
            let state = self.inner.lock().await;
            if state.columns.iter().all(|c| c.id != card.column_id) {
                return Err(BoardError::Validation(format!(
                    "unknown column {}",
                    card.column_id
                )));
            }
        }
        let created = self.api.create_card(&card).await?;
        {
            let mut state = self.inner.lock().await;
            state.cards.push(created.clone());
        }
        let _ = self.events.send(BoardEvent::CardsChanged);
        Ok(created)
    }

    pub async fn delete_card(self: &Arc<Self>, card_id: CardId) -> Result<(), BoardError> {
        let (snapshot, selection_changed) = {
            let mut state = self.inner.lock().await;
            if state.cards.iter().all(|c| c.id != card_id) {
                return Err(BoardError::Validation(format!("unknown card {card_id}")));
            }
            if let Some(task) = state.refetch_task.take() {
                task.abort();
            }
            let snapshot = state.cards.clone();
            state.cards.retain(|c| c.id != card_id);
            let selected = state.selection.contains(&card_id);
            if selected {
                state.selection.clear();
            }
            (snapshot, selected)
        };
        let _ = self.events.send(BoardEvent::CardsChanged);
        if selection_changed {
            let _ = self.events.send(BoardEvent::SelectionChanged);
        }

        match self.api.delete_card(card_id).await {
            Ok(()) => {
                self.inner.lock().await.cards_stale = true;
                self.schedule_cards_refetch().await;
                Ok(())
            }
            Err(err) => {
                self.rollback_cards(snapshot).await;
                self.notify_error(format!("Delete failed: {}", err.user_message()));
                Err(err)
            }
        }
    }

    async fn rollback_cards(&self, snapshot: Vec<Card>) {
        {
            let mut state = self.inner.lock().await;
            state.cards = snapshot;
            state.cards_stale = true;
        }
        let _ = self.events.send(BoardEvent::CardsChanged);
    }

    // ---- bulk edit -----------------------------------------------------

    /// Apply one field change to every card in the current selection, one
    /// concurrent request per card. Partial failure is tolerated: the
    /// outcome reports counts, successes are kept, and the collection is
    /// refetched either way.
    pub async fn bulk_edit(self: &Arc<Self>, edit: BulkEdit) -> Result<BulkOutcome, BoardError> {
        let card_ids: Vec<CardId> = {
            let state = self.inner.lock().await;
            if let BulkEdit::Column(column_id) = &edit {
                if state.columns.iter().all(|c| &c.id != column_id) {
                    return Err(BoardError::Validation(format!(
                        "unknown column {column_id}"
                    )));
                }
            }
            state
                .cards
                .iter()
                .filter(|c| state.selection.contains(&c.id))
                .map(|c| c.id)
                .collect()
        };
        if card_ids.is_empty() {
            return Err(BoardError::Validation("nothing selected".to_string()));
        }

        let results = join_all(card_ids.iter().map(|id| {
            let edit = edit.clone();
            async move {
                match edit {
                    BulkEdit::Assignee(assignee) => {
                        self.api.assign_card(*id, assignee).await.map(|_| ())
                    }
                    BulkEdit::Machine(machine) => {
                        let patch = CardPatch {
                            machine: Some(machine),
                            ..Default::default()
                        };
                        self.api.patch_card(*id, &patch).await.map(|_| ())
                    }
                    BulkEdit::Column(column_id) => {
                        self.api.move_card(*id, &column_id).await.map(|_| ())
                    }
                }
            }
        }))
        .await;

        let total = card_ids.len();
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            self.notify_error(format!("{failed} of {total} cards failed"));
        }

        let selection_cleared = {
            let mut state = self.inner.lock().await;
            state.cards_stale = true;
            if matches!(edit, BulkEdit::Column(_)) && failed == 0 {
                state.selection.clear();
                true
            } else {
                false
            }
        };
        if selection_cleared {
            let _ = self.events.send(BoardEvent::SelectionChanged);
        }
        self.schedule_cards_refetch().await;

        Ok(BulkOutcome { total, failed })
    }

    // ---- edit mode and structural column edits -------------------------

    pub async fn set_edit_mode(&self, enabled: bool) {
        let mut state = self.inner.lock().await;
        if state.edit_mode == enabled {
            return;
        }
        state.edit_mode = enabled;
        if !enabled {
            // In-memory edits stay visible; only the pending write is
            // suppressed once persistence is no longer allowed.
            state.autosave_timer.cancel();
        }
    }

    pub async fn add_column(self: &Arc<Self>, title: &str) -> Result<ColumnId, BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::Validation(
                "column title cannot be empty".to_string(),
            ));
        }
        let title = title.to_string();
        self.structural_edit(move |columns| {
            let id = ColumnId(column_id_for_title(&title, columns));
            columns.push(Column {
                id: id.clone(),
                title,
                position: columns.len() as u32,
            });
            Ok(id)
        })
        .await
    }

    pub async fn rename_column(
        self: &Arc<Self>,
        column_id: &ColumnId,
        title: &str,
    ) -> Result<(), BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::Validation(
                "column title cannot be empty".to_string(),
            ));
        }
        let title = title.to_string();
        let column_id = column_id.clone();
        self.structural_edit(move |columns| {
            let Some(column) = columns.iter_mut().find(|c| c.id == column_id) else {
                return Err(BoardError::Validation(format!("unknown column {column_id}")));
            };
            column.title = title;
            Ok(())
        })
        .await
    }

    pub async fn delete_column(self: &Arc<Self>, column_id: &ColumnId) -> Result<(), BoardError> {
        let column_id = column_id.clone();
        self.structural_edit(move |columns| {
            let before = columns.len();
            columns.retain(|c| c.id != column_id);
            if columns.len() == before {
                return Err(BoardError::Validation(format!("unknown column {column_id}")));
            }
            Ok(())
        })
        .await
    }

    pub async fn reorder_column(
        self: &Arc<Self>,
        column_id: &ColumnId,
        target_index: usize,
    ) -> Result<(), BoardError> {
        let column_id = column_id.clone();
        self.structural_edit(move |columns| {
            let Some(from) = columns.iter().position(|c| c.id == column_id) else {
                return Err(BoardError::Validation(format!("unknown column {column_id}")));
            };
            let column = columns.remove(from);
            let to = target_index.min(columns.len());
            columns.insert(to, column);
            Ok(())
        })
        .await
    }

    /// Adopt a config update that arrived from outside this client (for
    /// example a cancel action restoring an earlier saved state). Our own
    /// just-persisted write echoing back is recognized by its
    /// serialization and ignored, which breaks the update loop.
    pub async fn apply_external_config(&self, config: BoardConfig) {
        let changed = {
            let mut state = self.inner.lock().await;
            let mut columns = config.columns;
            views::sort_by_position(&mut columns);
            views::normalize_positions(&mut columns);
            let fingerprint = config_fingerprint(&columns);
            if fingerprint.is_some() && fingerprint == state.last_synced_config {
                false
            } else {
                state.autosave_timer.cancel();
                state.columns = columns;
                state.last_synced_config = fingerprint;
                state.columns_stale = false;
                true
            }
        };
        if changed {
            let _ = self.events.send(BoardEvent::ColumnsChanged);
        }
    }

    /// Apply one structural edit to the in-memory column list, keep
    /// positions dense, and (while in edit mode) restart the quiet-period
    /// timer so only the final state of a burst is persisted.
    async fn structural_edit<R>(
        self: &Arc<Self>,
        edit: impl FnOnce(&mut Vec<Column>) -> Result<R, BoardError>,
    ) -> Result<R, BoardError> {
        let result = {
            let mut state = self.inner.lock().await;
            let result = edit(&mut state.columns)?;
            views::normalize_positions(&mut state.columns);
            if state.edit_mode {
                let client = Arc::clone(self);
                let quiet_period = self.quiet_period;
                state
                    .autosave_timer
                    .schedule(quiet_period, async move {
                        client.persist_columns().await;
                    });
            }
            result
        };
        let _ = self.events.send(BoardEvent::ColumnsChanged);
        Ok(result)
    }

    async fn persist_columns(self: Arc<Self>) {
        let config = {
            let mut state = self.inner.lock().await;
            views::normalize_positions(&mut state.columns);
            BoardConfig {
                columns: state.columns.clone(),
            }
        };
        match self.api.put_config(&config).await {
            Ok(()) => {
                let mut state = self.inner.lock().await;
                state.last_synced_config = config_fingerprint(&config.columns);
                state.columns_stale = false;
                debug!(columns = config.columns.len(), "board config persisted");
            }
            Err(err) => {
                warn!(error = %err, "board config autosave failed");
                self.inner.lock().await.columns_stale = true;
                self.notify_error(format!("Saving columns failed: {}", err.user_message()));
            }
        }
    }

    // ---- notifications -------------------------------------------------

    fn notify_error(&self, message: String) {
        warn!(%message, "board notification");
        let _ = self.events.send(BoardEvent::Notification(Notice {
            severity: Severity::Error,
            message,
        }));
    }
}

fn config_fingerprint(columns: &[Column]) -> Option<String> {
    serde_json::to_string(&BoardConfig {
        columns: columns.to_vec(),
    })
    .ok()
}

fn apply_patch(card: &mut Card, patch: &CardPatch) {
    if let Some(title) = &patch.title {
        card.title = title.clone();
    }
    if let Some(column_id) = &patch.column_id {
        card.column_id = column_id.clone();
    }
    if let Some(assignee) = &patch.assignee {
        card.assignee = Some(assignee.clone());
    }
    if let Some(machine) = &patch.machine {
        card.machine = Some(machine.clone());
    }
    if let Some(due_date) = &patch.due_date {
        card.due_date = Some(*due_date);
    }
    if let Some(process_ids) = &patch.process_ids {
        card.process_ids = process_ids.clone();
    }
    if let Some(quantity) = patch.quantity_per_robot {
        card.quantity_per_robot = Some(quantity);
    }
    if let Some(quantity) = patch.quantity_to_make {
        card.quantity_to_make = Some(quantity);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
