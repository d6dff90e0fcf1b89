//! Cancellable quiet-period timer and column-id helpers for structural
//! board edits.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use shared::domain::Column;

/// Explicit schedule/cancel debounce primitive. Each `schedule` call
/// replaces any pending task, so only the last edit within a burst fires.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Derive a column id slug from its title, unique among `existing`.
pub fn column_id_for_title(title: &str, existing: &[Column]) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for ch in title.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    let base = if slug.is_empty() { "column" } else { slug };

    if !existing.iter().any(|c| c.id.as_str() == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !existing.iter().any(|c| c.id.as_str() == candidate) {
            return candidate;
        }
        n += 1;
    }
}
