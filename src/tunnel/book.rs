//! Process-wide bookkeeping for the tunnel lifecycle.
//!
//! The book is injected into the controller instead of living in globals so
//! tests can build isolated controllers. All fields sit behind one lock so
//! the intent flag, deadline and timer handle always change together.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::state::TunnelState;

#[derive(Debug, Default)]
struct Entries {
    last_connected_at: Option<DateTime<Utc>>,
    deadline: Option<DateTime<Utc>>,
    manual_disconnect: bool,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    last_known: Option<TunnelState>,
}

#[derive(Debug, Default)]
pub struct TunnelBook {
    entries: Mutex<Entries>,
}

impl TunnelBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        self.entries.lock().last_connected_at
    }

    pub fn record_connected(&self, at: DateTime<Utc>) {
        self.entries.lock().last_connected_at = Some(at);
    }

    pub fn take_last_connected(&self) -> Option<DateTime<Utc>> {
        self.entries.lock().last_connected_at.take()
    }

    pub fn clear_manual_disconnect(&self) {
        self.entries.lock().manual_disconnect = false;
    }

    #[cfg(test)]
    pub fn manual_disconnect(&self) -> bool {
        self.entries.lock().manual_disconnect
    }

    /// Whether this process brought the tunnel up and nobody asked for it to
    /// come down, i.e. whether activity may extend the session.
    pub fn owns_connection(&self) -> bool {
        let e = self.entries.lock();
        e.last_connected_at.is_some() && !e.manual_disconnect
    }

    /// Record manual intent to disconnect, cancel any pending countdown and
    /// forget the local connect time.
    pub fn mark_manual_disconnect(&self) {
        let mut e = self.entries.lock();
        e.manual_disconnect = true;
        e.last_connected_at = None;
        cancel_locked(&mut e);
    }

    /// Replace any pending countdown with a new one. `spawn` receives the
    /// generation the new timer must present when it fires. Returns `false`
    /// without spawning while manual intent is active.
    pub fn arm<F>(&self, after: Duration, spawn: F) -> bool
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let mut e = self.entries.lock();
        if e.manual_disconnect {
            return false;
        }
        cancel_locked(&mut e);
        let deadline = chrono::Duration::from_std(after)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        e.deadline = deadline;
        e.timer = Some(spawn(e.generation));
        true
    }

    pub fn cancel_timer(&self) {
        cancel_locked(&mut self.entries.lock());
    }

    /// Claim an expired countdown. Returns `true` only if `generation` is
    /// still current and no manual intent is active; the handle is dropped
    /// without aborting since the caller is that very task.
    pub fn take_expired(&self, generation: u64) -> bool {
        let mut e = self.entries.lock();
        if e.generation != generation || e.manual_disconnect {
            return false;
        }
        e.timer = None;
        e.deadline = None;
        e.generation = e.generation.wrapping_add(1);
        true
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.entries.lock().deadline
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.entries.lock().generation
    }

    pub fn remember(&self, state: TunnelState) {
        self.entries.lock().last_known = Some(state);
    }

    pub fn last_known(&self) -> Option<TunnelState> {
        self.entries.lock().last_known.clone()
    }
}

fn cancel_locked(e: &mut Entries) {
    if let Some(timer) = e.timer.take() {
        timer.abort();
    }
    e.deadline = None;
    e.generation = e.generation.wrapping_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_task(_generation: u64) -> JoinHandle<()> {
        tokio::spawn(std::future::pending::<()>())
    }

    #[tokio::test]
    async fn test_arm_sets_deadline_and_bumps_generation() {
        let book = TunnelBook::new();
        let before = book.generation();
        assert!(book.arm(Duration::from_secs(600), idle_task));
        assert!(book.generation() > before);
        let deadline = book.deadline().unwrap();
        assert!(deadline > Utc::now() + chrono::Duration::seconds(590));
    }

    #[tokio::test]
    async fn test_manual_intent_blocks_arming() {
        let book = TunnelBook::new();
        book.record_connected(Utc::now());
        book.mark_manual_disconnect();
        assert!(!book.arm(Duration::from_secs(600), idle_task));
        assert!(book.deadline().is_none());
        assert!(book.last_connected_at().is_none());
        assert!(!book.owns_connection());
    }

    #[tokio::test]
    async fn test_stale_generation_cannot_expire() {
        let book = TunnelBook::new();
        let mut armed_with = None;
        book.arm(Duration::from_secs(600), |g| {
            armed_with = Some(g);
            idle_task(g)
        });
        let first = armed_with.unwrap();
        book.arm(Duration::from_secs(600), idle_task);
        assert!(!book.take_expired(first));
        assert!(book.deadline().is_some());
    }

    #[tokio::test]
    async fn test_current_generation_expires_once() {
        let book = TunnelBook::new();
        let mut armed_with = None;
        book.arm(Duration::from_secs(600), |g| {
            armed_with = Some(g);
            idle_task(g)
        });
        let generation = armed_with.unwrap();
        assert!(book.take_expired(generation));
        assert!(book.deadline().is_none());
        assert!(!book.take_expired(generation));
    }
}
