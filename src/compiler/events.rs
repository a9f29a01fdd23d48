//! Change tracking for the pass pipeline.
//!
//! Every transformation records what it did into an [`EventLog`]: a phi inserted, a
//! definition hoisted, a block dropped. The log is append-only and accepts new events through
//! a shared reference, so passes can record while holding other borrows of the pipeline.
//!
//! # Examples
//!
//! ```rust
//! use tacopt::compiler::{EventKind, EventLog};
//!
//! let events = EventLog::new();
//! events
//!     .record(EventKind::InstructionHoisted)
//!     .function("main")
//!     .block("loop")
//!     .message("ten = const 10");
//! events.warn("loop at 'spin' has no exit");
//!
//! assert_eq!(events.len(), 2);
//! assert_eq!(events.count(EventKind::InstructionHoisted), 1);
//! assert!(events.has(EventKind::Warning));
//! ```

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use strum::{Display, EnumIter};

/// What kind of change an [`Event`] describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A pass started on a function.
    PassStarted,
    /// A pass finished on a function.
    PassCompleted,
    /// A phi was inserted during SSA construction.
    PhiInserted,
    /// A phi was lowered into copies.
    PhiRemoved,
    /// A definition received a fresh SSA name.
    VariableRenamed,
    /// An instruction was moved out of a loop.
    InstructionHoisted,
    /// A preheader block was created.
    PreheaderInserted,
    /// A block was removed.
    BlockRemoved,
    /// An analysis was computed on request.
    AnalysisComputed,
    /// Informational message.
    Info,
    /// Something unexpected that did not stop processing.
    Warning,
}

/// A single recorded change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// The kind of change.
    pub kind: EventKind,
    /// The function the change applies to, if any.
    pub function: Option<String>,
    /// The block the change applies to, if any.
    pub block: Option<String>,
    /// Free-form detail.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(function) = &self.function {
            write!(f, " {function}")?;
            if let Some(block) = &self.block {
                write!(f, ".{block}")?;
            }
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Append-only event storage.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts recording an event of the given kind.
    ///
    /// The event is appended when the returned builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Some(Event {
                kind,
                function: None,
                block: None,
                message: String::new(),
            }),
        }
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.record(EventKind::Info).message(message);
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.record(EventKind::Warning).message(message);
    }

    /// Appends every event of `other`.
    pub fn merge(&self, other: EventLog) {
        for event in other.iter() {
            self.events.push(event.clone());
        }
    }

    /// Moves all events out, leaving the log empty.
    pub fn take(&mut self) -> EventLog {
        std::mem::take(self)
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Iterates over the events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, event)| event)
    }

    /// Returns the number of events of the given kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.iter().filter(|event| event.kind == kind).count()
    }

    /// Returns `true` if at least one event of the given kind was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|event| event.kind == kind)
    }

    /// Returns the events concerning one function.
    pub fn for_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Event> {
        self.iter()
            .filter(move |event| event.function.as_deref() == Some(function))
    }

    /// Returns a one-line summary such as `3 phi_inserted, 1 instruction_hoisted`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut counts: BTreeMap<EventKind, usize> = BTreeMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
            .iter()
            .filter(|(kind, _)| !matches!(kind, EventKind::PassStarted | EventKind::PassCompleted))
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fluent builder for one [`Event`]; appends to its log on drop.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventBuilder<'_> {
    /// Sets the function the event applies to.
    pub fn function(mut self, name: impl Into<String>) -> Self {
        if let Some(event) = &mut self.event {
            event.function = Some(name.into());
        }
        self
    }

    /// Sets the block the event applies to.
    pub fn block(mut self, name: impl Into<String>) -> Self {
        if let Some(event) = &mut self.event {
            event.block = Some(name.into());
        }
        self
    }

    /// Sets the message; this is usually the last call of the chain.
    pub fn message(mut self, message: impl Into<String>) {
        if let Some(event) = &mut self.event {
            event.message = message.into();
        }
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::PhiInserted)
            .function("f")
            .block("join")
            .message("x");
        let _ = log.record(EventKind::BlockRemoved);

        let events: Vec<&Event> = log.iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].to_string(), "[phi_inserted] f.join: x");
        assert_eq!(events[1].kind, EventKind::BlockRemoved);
        assert!(events[1].message.is_empty());
    }

    #[test]
    fn test_merge_and_take() {
        let mut log = EventLog::new();
        let other = EventLog::new();
        other.info("hello");
        other.warn("careful");
        log.merge(other);
        assert_eq!(log.len(), 2);

        let taken = log.take();
        assert!(log.is_empty());
        assert_eq!(taken.count(EventKind::Warning), 1);
    }

    #[test]
    fn test_summary_skips_pass_markers() {
        let log = EventLog::new();
        log.record(EventKind::PassStarted).function("f");
        log.record(EventKind::InstructionHoisted).function("f");
        log.record(EventKind::InstructionHoisted).function("g");
        log.record(EventKind::PassCompleted).function("f");
        assert_eq!(log.summary(), "2 instruction_hoisted");
        assert_eq!(log.for_function("f").count(), 3);
    }
}
