// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Notice board: where the session surfaces channel and simulator errors.
//!
//! Bounded queue with per-notice TTL and a short dedupe window, so a server
//! that repeats the same error on every frame shows one entry instead of a
//! flood.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Something degraded but the session continues.
    Warn,
    /// A command or the channel failed.
    Error,
}

/// Where the notice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSource {
    /// The simulation channel transport.
    Channel,
    /// The simulator, via an `error` frame.
    Simulator,
}

/// Identifier for a notice entry.
pub type NoticeId = u64;

/// One posted notice.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Origin.
    pub source: NoticeSource,
    /// Message text as received.
    pub message: String,
    /// Time-to-live.
    pub ttl: Duration,
    /// Post time (refreshed on dedupe).
    pub posted: Instant,
}

/// Default lifetime of an error notice.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(8);

/// In-memory notice queue with TTL and dedupe window.
#[derive(Debug)]
pub struct NoticeBoard {
    queue: VecDeque<Notice>,
    max: usize,
    dedupe_window: Duration,
    next_id: NoticeId,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(32)
    }
}

impl NoticeBoard {
    /// Create a board holding at most `max` notices.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Post a notice. An identical notice posted within the dedupe window is
    /// refreshed in place and keeps its id.
    pub fn post(
        &mut self,
        kind: NoticeKind,
        source: NoticeSource,
        message: impl Into<String>,
        ttl: Duration,
        now: Instant,
    ) -> NoticeId {
        let message = message.into();

        if let Some(existing) = self.queue.iter_mut().find(|n| {
            n.kind == kind
                && n.source == source
                && n.message == message
                && now.saturating_duration_since(n.posted) <= self.dedupe_window
        }) {
            existing.posted = now;
            existing.ttl = ttl;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Notice {
            id,
            kind,
            source,
            message,
            ttl,
            posted: now,
        });
        id
    }

    /// Post an error with the default TTL, timestamped now.
    pub fn error(&mut self, source: NoticeSource, message: impl Into<String>) -> NoticeId {
        self.post(
            NoticeKind::Error,
            source,
            message,
            DEFAULT_NOTICE_TTL,
            Instant::now(),
        )
    }

    /// Post a warning with the default TTL, timestamped now.
    pub fn warn(&mut self, source: NoticeSource, message: impl Into<String>) -> NoticeId {
        self.post(
            NoticeKind::Warn,
            source,
            message,
            DEFAULT_NOTICE_TTL,
            Instant::now(),
        )
    }

    /// Drop expired notices.
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue
            .retain(|n| now.saturating_duration_since(n.posted) < n.ttl);
    }

    /// Notices still within their TTL, oldest first.
    pub fn visible(&self, now: Instant) -> Vec<&Notice> {
        self.queue
            .iter()
            .filter(|n| now.saturating_duration_since(n.posted) < n.ttl)
            .collect()
    }

    /// Every queued notice regardless of age, oldest first.
    pub fn all(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }

    /// Most recent notice.
    pub fn latest(&self) -> Option<&Notice> {
        self.queue.back()
    }

    /// Number of queued notices.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
