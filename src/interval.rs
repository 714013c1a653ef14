//! Genomic query intervals and the interval set optimizer.
//!
//! Intervals are 1-based and closed, addressed by reference sequence id. Raw
//! coordinate entry points keep the conventional sentinels of coordinate-sorted
//! alignment tooling: a start at or below 1 means "from the beginning of the
//! reference" and an end of 0 means "to the end of the reference". Both are
//! normalized into explicit representations (`Position::MIN`,
//! [`IntervalEnd::Unbounded`]) at construction so no magic values survive.

use std::cmp::Ordering;
use std::fmt;

use noodles::core::Position;

use crate::{Error, Result};

/// Upper bound of an interval: a concrete 1-based position or the end of the
/// reference sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntervalEnd {
    At(Position),
    Unbounded,
}

impl IntervalEnd {
    /// Maps the raw `0 == unbounded` convention onto the tagged form.
    pub fn from_raw(end: i32) -> Result<Self> {
        match end {
            0 => Ok(IntervalEnd::Unbounded),
            e if e < 0 => Err(Error::InvalidInterval(format!("negative end: {e}"))),
            e => Position::try_from(e as usize)
                .map(IntervalEnd::At)
                .map_err(|_| Error::InvalidInterval(format!("invalid end: {e}"))),
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            IntervalEnd::At(position) => Some(*position),
            IntervalEnd::Unbounded => None,
        }
    }

    fn as_usize(&self) -> usize {
        match self {
            IntervalEnd::At(position) => usize::from(*position),
            IntervalEnd::Unbounded => usize::MAX,
        }
    }
}

impl PartialOrd for IntervalEnd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IntervalEnd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_usize().cmp(&other.as_usize())
    }
}

/// A closed coordinate range on one reference sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    reference_sequence_id: usize,
    start: Position,
    end: IntervalEnd,
}

impl GenomicInterval {
    /// Creates an interval, rejecting a concrete end before the start.
    pub fn new(reference_sequence_id: usize, start: Position, end: IntervalEnd) -> Result<Self> {
        if let IntervalEnd::At(end_position) = end
            && start > end_position
        {
            return Err(Error::InvalidInterval(format!(
                "start {start} is past end {end_position}"
            )));
        }

        Ok(Self {
            reference_sequence_id,
            start,
            end,
        })
    }

    /// Creates an interval from raw coordinates honoring the `1`/`0` sentinels.
    ///
    /// The reference index must be non-negative; `-1` is the unmapped sentinel
    /// and never a valid query target.
    pub fn from_raw(reference_sequence_id: i32, start: i32, end: i32) -> Result<Self> {
        if reference_sequence_id < 0 {
            return Err(Error::InvalidInterval(format!(
                "negative reference sequence index: {reference_sequence_id}"
            )));
        }

        let start = if start <= 1 {
            Position::MIN
        } else {
            Position::try_from(start as usize)
                .map_err(|_| Error::InvalidInterval(format!("invalid start: {start}")))?
        };

        Self::new(reference_sequence_id as usize, start, IntervalEnd::from_raw(end)?)
    }

    /// Single-position interval, used for exact-start and mate lookups.
    pub fn at(reference_sequence_id: usize, position: Position) -> Self {
        Self {
            reference_sequence_id,
            start: position,
            end: IntervalEnd::At(position),
        }
    }

    pub fn reference_sequence_id(&self) -> usize {
        self.reference_sequence_id
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> IntervalEnd {
        self.end
    }

    /// True if a record span on the same reference intersects this interval.
    pub fn overlaps_span(&self, reference_sequence_id: usize, start: Position, end: Position) -> bool {
        self.reference_sequence_id == reference_sequence_id
            && usize::from(start) <= self.end.as_usize()
            && usize::from(end) >= usize::from(self.start)
    }

    /// True if a record span on the same reference lies fully inside this interval.
    pub fn contains_span(&self, reference_sequence_id: usize, start: Position, end: Position) -> bool {
        self.reference_sequence_id == reference_sequence_id
            && start >= self.start
            && usize::from(end) <= self.end.as_usize()
    }

    /// True if `other` overlaps or directly abuts this interval on the same
    /// reference, i.e. the two merge into one contiguous interval.
    fn abuts_or_overlaps(&self, other: &Self) -> bool {
        self.reference_sequence_id == other.reference_sequence_id
            && usize::from(other.start) <= self.end.as_usize().saturating_add(1)
    }
}

impl PartialOrd for GenomicInterval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GenomicInterval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.reference_sequence_id
            .cmp(&other.reference_sequence_id)
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            IntervalEnd::At(end) => {
                write!(f, "{}:{}-{}", self.reference_sequence_id, self.start, end)
            }
            IntervalEnd::Unbounded => write!(f, "{}:{}-", self.reference_sequence_id, self.start),
        }
    }
}

/// Canonicalizes a set of intervals: sorted by `(reference, start, end)`, with
/// overlapping and directly adjacent same-reference intervals merged.
///
/// The result is idempotent and independent of input order. Intervals on
/// different references never merge. An unbounded end absorbs every later
/// interval on the same reference.
pub fn optimize_intervals(mut intervals: Vec<GenomicInterval>) -> Vec<GenomicInterval> {
    intervals.sort();

    let mut merged: Vec<GenomicInterval> = Vec::with_capacity(intervals.len());

    for interval in intervals {
        match merged.last_mut() {
            Some(last) if last.abuts_or_overlaps(&interval) => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }

    merged
}
