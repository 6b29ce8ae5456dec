//! Interval map from performance time to source-document event ranges.
//!
//! The compiler reports, for every musical event, the time span it occupies
//! (in quarter notes) and the character range in the source document that
//! produced it. [`EventTimeline`] indexes those spans so that "what is
//! sounding at time `t`" is a single binary search.
//!
//! ```text
//! events:   A [0,2)   B [1,3)
//!
//! segments: [0,1) {A}   [1,2) {A,B}   [2,3) {B}
//! ```
//!
//! Overlapping spans union their event sets; neighbouring segments with the
//! same set are merged, so the segment list is minimal.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Time in quarter notes from the start of the piece.
pub type Ticks = f64;

/// A set of events sharing one time segment.
pub type EventSet = BTreeSet<EventInfo>;

static EMPTY_SET: EventSet = BTreeSet::new();

/// One musical event mapped back to a range in a source document.
///
/// Identity is `(source_id, begin_position)`: two infos with the same source
/// and begin offset are the same event regardless of their times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub source_id: u32,
    pub begin_position: i32,
    pub end_position: i32,
    pub begin_time: Ticks,
    pub end_time: Ticks,
}

impl EventInfo {
    /// Sentinel for an end time the compiler did not report.
    pub const OPEN_END: Ticks = -1.0;

    pub fn new(
        source_id: u32,
        begin_position: i32,
        end_position: i32,
        begin_time: Ticks,
        end_time: Ticks,
    ) -> Self {
        Self {
            source_id,
            begin_position,
            end_position,
            begin_time,
            end_time,
        }
    }

    #[inline]
    pub fn is_open_ended(&self) -> bool {
        self.end_time == Self::OPEN_END
    }

    /// The half-open span this event covers, with open ends mapped to infinity.
    #[inline]
    pub fn span(&self) -> (Ticks, Ticks) {
        let end = if self.is_open_ended() {
            f64::INFINITY
        } else {
            self.end_time
        };
        (self.begin_time, end)
    }

    #[inline]
    fn key(&self) -> (u32, i32) {
        (self.source_id, self.begin_position)
    }
}

impl PartialEq for EventInfo {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EventInfo {}

impl PartialOrd for EventInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// A maximal time range over which the set of active events is constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: Ticks,
    /// Exclusive. `f64::INFINITY` for segments opened by open-ended events.
    pub end: Ticks,
    pub events: EventSet,
}

impl Segment {
    #[inline]
    pub fn contains(&self, t: Ticks) -> bool {
        self.start <= t && t < self.end
    }
}

/// Immutable interval map, rebuilt once per compilation.
#[derive(Debug, Clone, Default)]
pub struct EventTimeline {
    segments: Vec<Segment>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Edge {
    Close,
    Open,
}

impl EventTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the timeline from a flat event list.
    ///
    /// Events with an empty span are ignored. Events whose end precedes their
    /// begin (other than the open-end sentinel) are skipped with a warning.
    pub fn build<I>(events: I) -> Self
    where
        I: IntoIterator<Item = EventInfo>,
    {
        let mut edges: Vec<(Ticks, Edge, EventInfo)> = Vec::new();
        for info in events {
            let (begin, end) = info.span();
            if begin.is_nan() || end.is_nan() {
                warn!(?info, "skipping event with NaN time");
                continue;
            }
            if end < begin {
                warn!(?info, "skipping event ending before it begins");
                continue;
            }
            if end == begin {
                continue;
            }
            edges.push((begin, Edge::Open, info));
            if end.is_finite() {
                edges.push((end, Edge::Close, info));
            }
        }

        edges.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut active: BTreeMap<EventInfo, usize> = BTreeMap::new();
        let mut segments: Vec<Segment> = Vec::new();
        let mut i = 0;
        while i < edges.len() {
            let t = edges[i].0;
            while i < edges.len() && edges[i].0 == t {
                let (_, edge, info) = edges[i];
                match edge {
                    Edge::Open => *active.entry(info).or_insert(0) += 1,
                    Edge::Close => {
                        if let Some(count) = active.get_mut(&info) {
                            *count -= 1;
                            if *count == 0 {
                                active.remove(&info);
                            }
                        }
                    }
                }
                i += 1;
            }

            let next = edges.get(i).map_or(f64::INFINITY, |e| e.0);
            if active.is_empty() {
                continue;
            }
            let set: EventSet = active.keys().copied().collect();
            match segments.last_mut() {
                Some(prev) if prev.end == t && prev.events == set => prev.end = next,
                _ => segments.push(Segment {
                    start: t,
                    end: next,
                    events: set,
                }),
            }
        }

        debug!("Built event timeline: {} segments", segments.len());
        Self { segments }
    }

    /// All events whose span contains `t`; empty if `t` falls in a gap.
    pub fn query_at(&self, t: Ticks) -> &EventSet {
        let idx = self.segments.partition_point(|s| s.start <= t);
        match idx.checked_sub(1).map(|i| &self.segments[i]) {
            Some(segment) if segment.contains(t) => &segment.events,
            _ => &EMPTY_SET,
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.segments.iter()
    }

    /// Number of disjoint segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromIterator<EventInfo> for EventTimeline {
    fn from_iter<T: IntoIterator<Item = EventInfo>>(iter: T) -> Self {
        Self::build(iter)
    }
}
