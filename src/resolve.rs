//! Interval set → file region resolution.
//!
//! Resolution is deliberately coarse: bins bound where matching records can
//! live, so the chunk list is a superset of the exact answer. The record
//! filter re-checks every decoded record; resolution only has to guarantee it
//! never *misses* a region. Coalescing overlapping and back-to-back chunks
//! keeps each physical region from being decompressed twice when query
//! intervals are close together.

use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;

use crate::index::{BinIndex, MAX_POSITION, region_bins};
use crate::interval::{GenomicInterval, IntervalEnd};

/// Maps an optimized interval set to the minimal ordered list of file regions
/// the record filter must scan.
///
/// References absent from the index contribute nothing; an empty interval set
/// resolves to an empty region list.
pub fn resolve_chunks(intervals: &[GenomicInterval], index: &BinIndex) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for interval in intervals {
        let Some(reference) = index.reference(interval.reference_sequence_id()) else {
            continue;
        };

        let beg = usize::from(interval.start()) - 1;
        let end = match interval.end() {
            IntervalEnd::At(position) => usize::from(position),
            IntervalEnd::Unbounded => MAX_POSITION,
        };

        // Records overlapping this interval cannot start before the linear
        // index offset for the interval's first window.
        let min_offset = reference.min_offset(beg);

        for bin in region_bins(beg, end) {
            for chunk in reference.chunks_for_bin(bin) {
                if chunk.end() > min_offset {
                    chunks.push(*chunk);
                }
            }
        }
    }

    coalesce_chunks(chunks)
}

/// Sorts, dedupes, and merges chunks whose regions overlap or directly abut.
pub(crate) fn coalesce_chunks(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks.sort_by_key(|chunk| (chunk.start(), chunk.end()));
    chunks.dedup();

    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match merged.last_mut() {
            Some(last) if chunk.start() <= last.end() => {
                if chunk.end() > last.end() {
                    *last = Chunk::new(last.start(), chunk.end());
                }
            }
            _ => merged.push(chunk),
        }
    }

    merged
}
