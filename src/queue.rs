//! Debounced double-buffer queue with a retry lane.
//!
//! Grounded in the original `queue_system.hpp`'s `queue_system<file_queue_info>`
//! specialization: a buffer queue that the watcher thread appends to, swapped
//! into a ready queue that the processor thread drains, combined with
//! `timer.hpp`'s condvar-based wait/notify pattern for debounce-window timing.
//! A dedicated retry lane holds entries that failed quiescence or a transient
//! I/O error, so the processor's main loop is never blocked re-probing them.
//!
//! Coalescing within a debounce window follows the teacher's `WatcherBatch`
//! idiom: events for the same path are deduplicated to the latest within a
//! batch. Rename pairing is deliberately *not* done here: `RenamedOld` and
//! `RenamedNew` raw events are translated straight into `EventKind::RenameOld`/
//! `RenameNew` and appended to the ready queue in arrival order (bypassing
//! the per-path dedup map, which is keyed by path and would otherwise let a
//! rename's two different paths drift apart under alphabetic ordering). The
//! `pending_rename_old` cell that actually pairs them lives in the Processor
//! (processor.rs), per its role as sole mutator of destination state.
//!
//! Three named condition variables mirror the concurrency model: `start_timer`
//! (the timer thread waits here for a watcher arrival), `ready_nonempty` (the
//! processor waits here for a debounce swap), and `batch_complete` (signalled
//! whenever the ready queue drains to empty, letting `drain_and_stop` block
//! until the processor has finished the batch in flight).

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::event::{Event, EventKind, RawEvent, RawKind};
use crate::fsops::mirrored_path;

struct Inner {
    raw_buffer: Vec<RawEvent>,
    direct_buffer: Vec<Event>,
    ready: VecDeque<Event>,
    retry: VecDeque<(Event, Instant)>,
    start_timer: bool,
    shutting_down: bool,
    /// Set when a `BufferOverflow` raw event is coalesced, cleared by
    /// `take_overflow`. The processor drives a full diff sweep off this
    /// flag instead of a normal `Event` (§4.F).
    overflow: bool,
}

/// Shared handle to one job's queue. Cloned across the watcher thread, the
/// debounce timer thread, and the processor thread.
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<Mutex<Inner>>,
    start_timer_cv: Arc<Condvar>,
    ready_nonempty: Arc<Condvar>,
    batch_complete: Arc<Condvar>,
    src_root: PathBuf,
    dst_root: PathBuf,
    /// The "additive monitor" switch (§4.D): a `Removed` raw event is
    /// materialised as `EventKind::Removed` only when `sync` is set;
    /// otherwise it's dropped while the batch is built.
    sync: bool,
    pub debounce_window: Duration,
    pub retry_backoff: Duration,
}

impl EventQueue {
    pub fn new(src_root: PathBuf, dst_root: PathBuf, debounce_window: Duration, retry_backoff: Duration) -> Self {
        Self::with_sync(src_root, dst_root, debounce_window, retry_backoff, false)
    }

    pub fn with_sync(src_root: PathBuf, dst_root: PathBuf, debounce_window: Duration, retry_backoff: Duration, sync: bool) -> Self {
        EventQueue {
            inner: Arc::new(Mutex::new(Inner {
                raw_buffer: Vec::new(),
                direct_buffer: Vec::new(),
                ready: VecDeque::new(),
                retry: VecDeque::new(),
                start_timer: false,
                shutting_down: false,
                overflow: false,
            })),
            start_timer_cv: Arc::new(Condvar::new()),
            ready_nonempty: Arc::new(Condvar::new()),
            batch_complete: Arc::new(Condvar::new()),
            src_root,
            dst_root,
            sync,
            debounce_window,
            retry_backoff,
        }
    }

    fn mirror(&self, src: &PathBuf) -> PathBuf {
        mirrored_path(&self.src_root, &self.dst_root, src).unwrap_or_else(|_| self.dst_root.join(src))
    }

    /// Called by the watcher when a raw filesystem change arrives.
    /// Restarts the debounce timer, matching `DirectorySignal::monitor()`'s
    /// "every arrival resets the clock" behavior.
    pub fn add_raw(&self, raw: RawEvent) {
        let mut guard = self.inner.lock().unwrap();
        guard.raw_buffer.push(raw);
        guard.start_timer = true;
        self.start_timer_cv.notify_all();
    }

    /// Enqueues an already-coalesced event directly, bypassing raw
    /// translation. Used by the recovery sweep to inject synthesized
    /// `Recovered` events for entries the watcher never reported.
    pub fn add_to_queue(&self, event: Event) {
        let mut guard = self.inner.lock().unwrap();
        guard.direct_buffer.push(event);
        guard.start_timer = true;
        self.start_timer_cv.notify_all();
    }

    /// Runs in a dedicated timer thread: blocks until an arrival sets
    /// `start_timer`, then waits out the debounce window (restarting if
    /// more events arrive in the meantime), then swaps buffer into ready.
    /// Exits once the queue is marked shutting down (by `shutdown`/
    /// `drain_and_stop`), which pokes this wait via `start_timer_cv`.
    pub fn run_debounce_timer(&self) {
        loop {
            let mut guard = self.inner.lock().unwrap();
            while !guard.start_timer && !guard.shutting_down {
                guard = self.start_timer_cv.wait_timeout(guard, Duration::from_millis(200)).unwrap().0;
            }
            if guard.shutting_down {
                drop(guard);
                self.swap_buffer_to_ready();
                return;
            }
            guard.start_timer = false;
            drop(guard);
            std::thread::sleep(self.debounce_window);
            let (restarted, shutting_down) = {
                let guard = self.inner.lock().unwrap();
                (guard.start_timer, guard.shutting_down)
            };
            if shutting_down {
                self.swap_buffer_to_ready();
                return;
            }
            if !restarted {
                self.swap_buffer_to_ready();
            }
        }
    }

    /// Coalesces the buffered raw events (and any directly-injected
    /// events) into a deterministic per-path batch and moves it to the
    /// ready queue. Rename halves bypass the per-path map entirely and
    /// are appended in the order they were observed, so `RenameOld`
    /// always precedes its `RenameNew` regardless of how the two paths
    /// compare lexically.
    fn swap_buffer_to_ready(&self) {
        let mut guard = self.inner.lock().unwrap();
        if guard.raw_buffer.is_empty() && guard.direct_buffer.is_empty() {
            return;
        }
        let raws: Vec<RawEvent> = guard.raw_buffer.drain(..).collect();
        let directs: Vec<Event> = guard.direct_buffer.drain(..).collect();

        let mut batch: BTreeMap<PathBuf, Event> = BTreeMap::new();
        let mut renames: Vec<Event> = Vec::new();
        for raw in raws {
            match raw.kind {
                RawKind::RenamedOld => {
                    let dst = self.mirror(&raw.path);
                    renames.push(Event::new(EventKind::RenameOld, raw.path, dst));
                }
                RawKind::RenamedNew => {
                    let dst = self.mirror(&raw.path);
                    renames.push(Event::new(EventKind::RenameNew, raw.path, dst));
                }
                RawKind::Added => {
                    let dst = self.mirror(&raw.path);
                    batch.insert(raw.path.clone(), Event::new(EventKind::Added, raw.path, dst));
                }
                RawKind::Modified => {
                    let dst = self.mirror(&raw.path);
                    batch.insert(raw.path.clone(), Event::new(EventKind::Updated, raw.path, dst));
                }
                RawKind::Removed => {
                    // "Additive monitor" mode (§4.D): without -sync, a
                    // removal from the source is never propagated to the
                    // destination — the event is silently dropped here,
                    // at construction time, rather than carried as a
                    // `None`-kind Event.
                    if self.sync {
                        let dst = self.mirror(&raw.path);
                        batch.insert(raw.path.clone(), Event::new(EventKind::Removed, raw.path, dst));
                    } else {
                        batch.remove(&raw.path);
                    }
                }
                RawKind::BufferOverflow => {
                    guard.overflow = true;
                }
            }
        }
        for event in directs {
            batch.insert(event.src.clone(), event);
        }

        guard.ready.extend(batch.into_values());
        guard.ready.extend(renames);
        self.ready_nonempty.notify_all();
    }

    /// Pops the next ready event for the processor, also surfacing any
    /// retry-lane entries whose backoff has elapsed. Blocks up to `timeout`.
    pub fn pop_ready(&self, timeout: Duration) -> Option<Event> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(ev) = self.take_due_retry(&mut guard) {
            return Some(ev);
        }
        if guard.ready.is_empty() {
            let (g, _) = self.ready_nonempty.wait_timeout(guard, timeout).unwrap();
            guard = g;
        }
        if let Some(ev) = self.take_due_retry(&mut guard) {
            return Some(ev);
        }
        let popped = guard.ready.pop_front();
        if guard.ready.is_empty() {
            self.batch_complete.notify_all();
        }
        popped
    }

    fn take_due_retry(&self, guard: &mut Inner) -> Option<Event> {
        let now = Instant::now();
        if let Some(pos) = guard.retry.iter().position(|(_, due)| *due <= now) {
            return guard.retry.remove(pos).map(|(ev, _)| ev);
        }
        None
    }

    /// Defers an event for a later retry attempt, used when quiescence
    /// probing or a transient I/O error means the entry isn't ready yet.
    pub fn push_retry(&self, event: Event) {
        let mut guard = self.inner.lock().unwrap();
        let due = Instant::now() + self.retry_backoff;
        guard.retry.push_back((event, due));
    }

    /// Consumes the overflow flag if set, signalling the caller to run a
    /// full diff sweep. Idempotent: returns `false` on subsequent calls
    /// until another `BufferOverflow` is coalesced.
    pub fn take_overflow(&self) -> bool {
        let mut guard = self.inner.lock().unwrap();
        std::mem::take(&mut guard.overflow)
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync
    }

    /// Marks the queue as shutting down and wakes every waiter (the timer
    /// on `start_timer`, the processor on `ready_nonempty`, and any
    /// `drain_and_stop` caller on `batch_complete`).
    pub fn shutdown(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.shutting_down = true;
        drop(guard);
        self.start_timer_cv.notify_all();
        self.ready_nonempty.notify_all();
        self.batch_complete.notify_all();
    }

    /// Blocks the caller until the ready queue currently in flight has
    /// been fully drained by the processor, then marks the queue shutting
    /// down. This is the Supervisor's step (b) of its ordered teardown:
    /// stop Watchers, `drain_and_stop`, join Processor, join timer.
    pub fn drain_and_stop(&self) {
        self.shutdown();
        let guard = self.inner.lock().unwrap();
        let _ = self.batch_complete.wait_while(guard, |inner| !inner.ready.is_empty()).unwrap();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.lock().unwrap().shutting_down
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.raw_buffer.is_empty() && guard.direct_buffer.is_empty() && guard.ready.is_empty() && guard.retry.is_empty()
    }

    #[cfg(test)]
    pub fn retry_len(&self) -> usize {
        self.inner.lock().unwrap().retry.len()
    }

    #[cfg(test)]
    pub fn force_swap(&self) {
        self.swap_buffer_to_ready();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn queue() -> EventQueue {
        EventQueue::new(
            PathBuf::from("/src"),
            PathBuf::from("/dst"),
            Duration::from_millis(10),
            Duration::from_millis(10),
        )
    }

    fn ev(n: u32) -> Event {
        Event::new(EventKind::Added, format!("/src/{n}").into(), format!("/dst/{n}").into())
    }

    fn raw(kind: RawKind, path: &str) -> RawEvent {
        RawEvent { kind, path: PathBuf::from(path), observed_at: Instant::now() }
    }

    #[test]
    fn add_then_manual_swap_makes_ready() {
        let q = queue();
        q.add_to_queue(ev(1));
        q.force_swap();
        let got = q.pop_ready(Duration::from_millis(50));
        assert!(got.is_some());
    }

    #[test]
    fn raw_added_mirrors_dst_root() {
        let q = queue();
        q.add_raw(raw(RawKind::Added, "/src/a.txt"));
        q.force_swap();
        let got = q.pop_ready(Duration::from_millis(50)).unwrap();
        assert_eq!(got.dst, PathBuf::from("/dst/a.txt"));
        assert_eq!(got.kind, EventKind::Added);
    }

    #[test]
    fn rename_pair_produces_ordered_old_then_new_events() {
        let q = queue();
        q.add_raw(raw(RawKind::RenamedOld, "/src/old.txt"));
        q.add_raw(raw(RawKind::RenamedNew, "/src/new.txt"));
        q.force_swap();
        let first = q.pop_ready(Duration::from_millis(50)).unwrap();
        assert_eq!(first.kind, EventKind::RenameOld);
        assert_eq!(first.src, PathBuf::from("/src/old.txt"));
        let second = q.pop_ready(Duration::from_millis(50)).unwrap();
        assert_eq!(second.kind, EventKind::RenameNew);
        assert_eq!(second.src, PathBuf::from("/src/new.txt"));
    }

    #[test]
    fn rename_events_stay_contiguous_despite_unrelated_traffic() {
        let q = queue();
        q.add_raw(raw(RawKind::RenamedOld, "/src/zzz_old.txt"));
        q.add_raw(raw(RawKind::Added, "/src/aaa_unrelated.txt"));
        q.add_raw(raw(RawKind::RenamedNew, "/src/aaa_new.txt"));
        q.force_swap();
        let mut kinds = Vec::new();
        while let Some(ev) = q.pop_ready(Duration::from_millis(5)) {
            kinds.push(ev.kind);
        }
        let old_pos = kinds.iter().position(|k| *k == EventKind::RenameOld).unwrap();
        let new_pos = kinds.iter().position(|k| *k == EventKind::RenameNew).unwrap();
        assert_eq!(new_pos, old_pos + 1, "rename halves must be adjacent in arrival order");
    }

    #[test]
    fn repeated_events_for_same_path_collapse_to_latest() {
        let q = queue();
        q.add_raw(raw(RawKind::Added, "/src/a.txt"));
        q.add_raw(raw(RawKind::Modified, "/src/a.txt"));
        q.force_swap();
        let got = q.pop_ready(Duration::from_millis(50)).unwrap();
        assert_eq!(got.kind, EventKind::Updated);
        assert!(q.pop_ready(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn retry_lane_holds_until_due() {
        let q = queue();
        q.push_retry(ev(2));
        assert_eq!(q.retry_len(), 1);
        let immediate = q.pop_ready(Duration::from_millis(5));
        assert!(immediate.is_none());
        std::thread::sleep(Duration::from_millis(40));
        let got = q.pop_ready(Duration::from_millis(5));
        assert!(got.is_some());
    }

    #[test]
    fn removed_event_is_dropped_without_sync() {
        let q = queue();
        assert!(!q.sync_enabled());
        q.add_raw(raw(RawKind::Removed, "/src/a.txt"));
        q.force_swap();
        assert!(q.pop_ready(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn removed_event_survives_with_sync() {
        let q = EventQueue::with_sync(
            PathBuf::from("/src"),
            PathBuf::from("/dst"),
            Duration::from_millis(10),
            Duration::from_millis(10),
            true,
        );
        q.add_raw(raw(RawKind::Removed, "/src/a.txt"));
        q.force_swap();
        let got = q.pop_ready(Duration::from_millis(5)).unwrap();
        assert_eq!(got.kind, EventKind::Removed);
    }

    #[test]
    fn buffer_overflow_raw_event_sets_overflow_flag_not_a_normal_event() {
        let q = queue();
        q.add_raw(raw(RawKind::BufferOverflow, "/src"));
        q.force_swap();
        assert!(q.pop_ready(Duration::from_millis(5)).is_none());
        assert!(q.take_overflow());
        assert!(!q.take_overflow());
    }

    #[test]
    fn debounce_timer_runs_and_shuts_down() {
        let q = queue();
        q.add_raw(raw(RawKind::Added, "/src/x.txt"));
        let q2 = q.clone();
        let handle = std::thread::spawn(move || {
            q2.run_debounce_timer();
        });
        std::thread::sleep(Duration::from_millis(100));
        q.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn drain_and_stop_blocks_until_ready_queue_empties() {
        let q = queue();
        q.add_to_queue(ev(1));
        q.force_swap();
        assert!(!q.is_empty());

        let q2 = q.clone();
        let drainer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            q2.pop_ready(Duration::from_millis(200));
        });

        q.drain_and_stop();
        drainer.join().unwrap();
        assert!(q.is_empty());
        assert!(q.is_shutting_down());
    }
}
