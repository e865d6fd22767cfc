// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use arrayvec::ArrayVec;

/// Unsigned time, in the clock units of the core using the scheduler.
pub type Time = u64;
/// Signed time, used for events that are already late.
pub type TimeS = i64;

/// A scheduler used by the emulation cores to schedule peripherals.
/// It is generic over the possible events; every event kind can only be
/// pending once. Events count down towards zero and are handed out by
/// [Scheduler::get_next_pending] once they have reached it.
#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Scheduler<E: Kind> {
    /// Time elapsed in the current step that has not been applied
    /// with [Scheduler::advance] yet.
    elapsed: TimeS,
    /// Events currently awaiting execution, sorted by descending remaining
    /// time. The next event to fire is always the last one.
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    events: ArrayVec<ScheduledEvent<E>, 16>,
}

impl<E: Kind> Scheduler<E> {
    /// Schedule an event of the given kind after the given amount
    /// of cycles have elapsed from now. Any previous event of the same kind
    /// is replaced.
    /// Time already elapsed in the current step is added, since that
    /// will be subtracted again by the next call to [Scheduler::advance].
    pub fn add_event(&mut self, kind: E, after: Time) {
        self.remove_event(kind);
        let remaining = (after as TimeS).saturating_add(self.elapsed);
        let event = ScheduledEvent { kind, remaining };

        // Events with equal time go in front of the ones already here,
        // so that the older ones fire first.
        let idx = self.events.partition_point(|e| e.remaining > remaining);
        if self.events.try_insert(idx, event).is_err() {
            log::error!("Scheduler is full, dropping event!");
        }
    }

    /// Move an already scheduled event to a new time.
    pub fn change_event_time(&mut self, kind: E, after: Time) {
        self.add_event(kind, after);
    }

    /// Cancel an event of a given type. Does nothing if no such event
    /// is pending.
    pub fn remove_event(&mut self, kind: E) {
        if let Some(idx) = self.events.iter().position(|e| e.kind == kind) {
            self.events.remove(idx);
        }
    }

    /// Note that the given amount of cycles have elapsed in the current
    /// step, without firing anything yet.
    #[inline]
    pub fn tick(&mut self, cycles: Time) {
        self.elapsed += cycles as TimeS;
    }

    /// Advance the timer by the given amount of ticks. Events that become
    /// due can then be taken with [Scheduler::get_next_pending].
    pub fn advance(&mut self, by: Time) {
        let by = by as TimeS;
        for event in &mut self.events {
            event.remaining -= by;
        }
        self.elapsed = (self.elapsed - by).max(0);
    }

    /// Take the next event that is due, if there is one.
    /// Events are removed before being returned, so a handler
    /// is free to schedule the same kind again.
    #[inline]
    pub fn get_next_pending(&mut self) -> Option<Event<E>> {
        match self.events.last() {
            Some(event) if event.remaining <= 0 => {
                let event = self.events.pop()?;
                Some(Event {
                    kind: event.kind,
                    late_by: -event.remaining,
                })
            }
            _ => None,
        }
    }

    /// Are there any events that are due?
    #[inline]
    pub fn has_events(&self) -> bool {
        self.events.last().is_some_and(|e| e.remaining <= 0)
    }

    /// Cycles from now until the next event is due, or [TimeS::MAX]
    /// if nothing is scheduled.
    pub fn next_event_in(&self) -> TimeS {
        self.events
            .last()
            .map_or(TimeS::MAX, |e| e.remaining - self.elapsed)
    }

    /// Cycles from now until the given event is due, if it is scheduled.
    pub fn remaining(&self, kind: E) -> Option<TimeS> {
        self.events
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.remaining - self.elapsed)
    }

    pub fn is_scheduled(&self, kind: E) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Time elapsed in the current step.
    #[inline]
    pub fn elapsed(&self) -> TimeS {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An event awaiting execution
#[derive(Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct ScheduledEvent<E: Kind> {
    /// Kind of event to execute
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    kind: E,
    /// Cycles until the event is due
    remaining: TimeS,
}

/// Trait for event kinds.
#[cfg(feature = "serde")]
pub trait Kind:
    for<'de> serde::Deserialize<'de> + serde::Serialize + PartialEq + Copy + Clone
{
}
#[cfg(not(feature = "serde"))]
pub trait Kind: PartialEq + Copy + Clone {}

/// Event that is ready to be handled.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Event<E: Kind> {
    /// The kind of event to handle
    pub kind: E,
    /// By how many ticks the event was delayed by. For example:
    /// - Event was scheduled to be executed in 50 ticks
    /// - Scheduler advanced by 60 ticks before the event got handled
    /// - `late_by` will be 60 - 50 = 10.
    pub late_by: TimeS,
}
