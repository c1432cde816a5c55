// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered log of executed-instruction trace lines.

/// One human-readable trace line.
pub type TraceEntry = String;

/// Trace lines for the current channel, oldest first.
///
/// Grows by [`append`](Self::append) while stepping and is swapped out
/// wholesale by [`replace_all`](Self::replace_all) when a run completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceLog {
    entries: Vec<TraceEntry>,
}

impl TraceLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one line at the end.
    pub fn append(&mut self, entry: impl Into<TraceEntry>) {
        self.entries.push(entry.into());
    }

    /// Discard the current content and take `entries` verbatim.
    pub fn replace_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = TraceEntry>,
    {
        self.entries.clear();
        self.entries.extend(entries);
    }

    /// Empty the log.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Lines in arrival order.
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no lines are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over lines in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, TraceEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a TraceLog {
    type Item = &'a TraceEntry;
    type IntoIter = std::slice::Iter<'a, TraceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
