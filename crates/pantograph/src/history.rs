//! Bounded undo/redo history over the working node and edge sets.
//!
//! The history is a linear stack of snapshots. Rapid bursts of change
//! coalesce into one snapshot captured after a short idle window, so a
//! continuous drag produces a single undo step for its settled position
//! rather than one per mouse event. Pure selection changes and in-progress
//! drags or resizes never reach the stack at all.
//!
//! Timing is driven by caller-supplied [`Instant`]s rather than an internal
//! clock, which keeps capture deterministic and directly testable.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::trace;

use pantograph_core::model::{DiagramEdge, DiagramNode};

/// The recorded payload of one history entry.
///
/// Selection is deliberately absent: it is transient UI state, reapplied
/// independently after a restore.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
}

impl Snapshot {
    pub fn new(nodes: Vec<DiagramNode>, edges: Vec<DiagramEdge>) -> Self {
        Self { nodes, edges }
    }
}

/// Classification of a working-set change for history purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    /// Selection toggles. Never recorded.
    Selection,
    /// Position updates while a drag is still in progress. Never recorded.
    DragInProgress,
    /// A drag settled on its final position.
    DragSettled,
    /// Dimension updates while a resize is still in progress. Never
    /// recorded.
    ResizeInProgress,
    /// A resize completed.
    ResizeSettled,
    /// Nodes or edges were added, removed, or had properties edited.
    Structural,
}

impl ChangeClass {
    /// Whether this change should eventually produce a snapshot.
    pub fn is_meaningful(self) -> bool {
        matches!(
            self,
            ChangeClass::DragSettled | ChangeClass::ResizeSettled | ChangeClass::Structural
        )
    }
}

/// Default number of retained snapshots.
pub const DEFAULT_LIMIT: usize = 100;

/// Default idle window before a scheduled capture fires.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_millis(150);

/// Linear undo/redo stack with coalesced capture.
#[derive(Debug)]
pub struct History {
    past: VecDeque<Snapshot>,
    future: Vec<Snapshot>,
    limit: usize,
    idle_window: Duration,
    deadline: Option<Instant>,
    restoring: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            limit: limit.max(1),
            idle_window: DEFAULT_IDLE_WINDOW,
            deadline: None,
            restoring: false,
        }
    }

    /// Set the idle window after which a scheduled capture fires
    pub fn set_idle_window(&mut self, window: Duration) -> &mut Self {
        self.idle_window = window;
        self
    }

    /// Records the initial state as the first history entry. The oldest
    /// entry is the floor of the stack and is never undone past.
    pub fn seed(&mut self, snapshot: Snapshot) {
        self.past.clear();
        self.future.clear();
        self.deadline = None;
        self.past.push_back(snapshot);
    }

    /// Notes that the working set changed.
    ///
    /// Noise classes and changes made while a restore is in progress are
    /// dropped. Meaningful changes (re)arm the capture deadline, so a burst
    /// of changes collapses into one snapshot taken after the idle window.
    /// Returns whether a capture is now pending.
    pub fn note_change(&mut self, class: ChangeClass, now: Instant) -> bool {
        if self.restoring || !class.is_meaningful() {
            return false;
        }
        trace!(class:? = class; "Scheduling history capture");
        self.deadline = Some(now + self.idle_window);
        true
    }

    /// Fires a pending capture whose deadline has passed.
    ///
    /// The snapshot is read through the closure at fire time, never at
    /// schedule time, so the captured state is always current. Returns
    /// whether a snapshot was recorded.
    pub fn poll(&mut self, now: Instant, current: impl FnOnce() -> Snapshot) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.capture(current())
            }
            _ => false,
        }
    }

    /// Captures immediately, canceling any pending deadline.
    pub fn commit(&mut self, snapshot: Snapshot) -> bool {
        self.deadline = None;
        self.capture(snapshot)
    }

    fn capture(&mut self, snapshot: Snapshot) -> bool {
        if self.restoring {
            return false;
        }
        if self.past.back() == Some(&snapshot) {
            trace!("Skipping capture of unchanged state");
            return false;
        }
        self.future.clear();
        self.past.push_back(snapshot);
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
        trace!(depth = self.past.len(); "Captured history snapshot");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.past.len() >= 2
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Steps back one entry, returning the snapshot to restore.
    ///
    /// Enters the restoring state: subsequent [`History::note_change`]
    /// calls are suppressed until [`History::finish_restore`], so applying
    /// the returned snapshot cannot feed back into the stack. Any pending
    /// capture is canceled.
    pub fn undo(&mut self) -> Option<Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.deadline = None;
        let current = self.past.pop_back()?;
        self.future.push(current);
        let target = self.past.back()?.clone();
        self.restoring = true;
        Some(target)
    }

    /// Steps forward one entry, returning the snapshot to restore. Same
    /// restoring-state rules as [`History::undo`].
    pub fn redo(&mut self) -> Option<Snapshot> {
        let target = self.future.pop()?;
        self.deadline = None;
        self.past.push_back(target.clone());
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
        self.restoring = true;
        Some(target)
    }

    /// Leaves the restoring state, re-enabling capture.
    pub fn finish_restore(&mut self) {
        self.restoring = false;
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn depth(&self) -> usize {
        self.past.len()
    }
}
