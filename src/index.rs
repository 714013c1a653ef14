//! Read-only view of a BAI-style binning index.
//!
//! The on-disk format is parsed by `noodles::bam::bai`; this module reshapes
//! the parsed index into the query engine's working form: per reference, a
//! bin id → chunk table plus the 16 kbp linear index, and one designated
//! "start of unmapped records" marker for the whole file.
//!
//! The binning scheme is the standard hierarchical one covering 512 Mbp in
//! six levels (1 × 512 Mbp down to 32768 × 16 kbp), so any query interval
//! intersects O(log N) bins.

use std::collections::HashMap;

use noodles::bam::bai;
use noodles::bgzf;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::csi::binning_index::ReferenceSequence as _;

/// Log2 of the width of a linear index window (16 kbp).
const LINEAR_INDEX_SHIFT: u32 = 14;

/// Width of the binned coordinate space.
pub(crate) const MAX_POSITION: usize = 1 << 29;

/// Binning and linear index data for one reference sequence.
#[derive(Debug, Default, Clone)]
pub struct ReferenceBins {
    bins: HashMap<u32, Vec<Chunk>>,
    linear: Vec<bgzf::VirtualPosition>,
}

impl ReferenceBins {
    pub fn chunks_for_bin(&self, bin: u32) -> &[Chunk] {
        self.bins.get(&bin).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Lower bound, from the linear index, on where records overlapping a
    /// window starting at `start` (0-based) can live. Chunks ending at or
    /// before this offset cannot contain matching records.
    pub fn min_offset(&self, start: usize) -> bgzf::VirtualPosition {
        let window = start >> LINEAR_INDEX_SHIFT;
        self.linear
            .get(window)
            .copied()
            .unwrap_or_else(|| bgzf::VirtualPosition::from(0))
    }
}

/// Per-reference bin → chunk mapping plus the unmapped-start marker.
///
/// Built externally (by whatever wrote the BAI); immutable here and shared by
/// every query iterator on the owning reader.
#[derive(Debug, Default, Clone)]
pub struct BinIndex {
    references: Vec<ReferenceBins>,
    unmapped_start: Option<bgzf::VirtualPosition>,
}

impl BinIndex {
    /// Adapts a parsed BAI index.
    ///
    /// The unmapped-start marker is the furthest point mapped data is known
    /// to reach: the maximum over references of the metadata end position and
    /// the last linear index entry. Unmapped records are stored after all
    /// mapped records, so scanning forward from the marker (skipping mapped
    /// stragglers) visits exactly the unmapped tail. A file with no mapped
    /// data has no marker.
    pub fn from_bai(index: &bai::Index) -> Self {
        let mut references = Vec::with_capacity(index.reference_sequences().len());
        let mut unmapped_start: Option<bgzf::VirtualPosition> = None;

        for reference_sequence in index.reference_sequences() {
            let mut bins = HashMap::with_capacity(reference_sequence.bins().len());

            for (&id, bin) in reference_sequence.bins() {
                bins.insert(id as u32, bin.chunks().to_vec());
            }

            let linear: Vec<bgzf::VirtualPosition> = reference_sequence.index().to_vec();

            if let Some(last) = linear.last().copied() {
                unmapped_start = unmapped_start.max(Some(last));
            }

            if let Some(metadata) = reference_sequence.metadata() {
                unmapped_start = unmapped_start.max(Some(metadata.end_position()));
            }

            references.push(ReferenceBins { bins, linear });
        }

        Self {
            references,
            unmapped_start,
        }
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn reference(&self, reference_sequence_id: usize) -> Option<&ReferenceBins> {
        self.references.get(reference_sequence_id)
    }

    /// Virtual position where the unmapped tail begins, if the file has any
    /// mapped data at all.
    pub fn unmapped_start(&self) -> Option<bgzf::VirtualPosition> {
        self.unmapped_start
    }
}

/// Bin ids a 0-based half-open region `[beg, end)` can intersect, coarsest
/// level first.
pub(crate) fn region_bins(beg: usize, end: usize) -> Vec<u32> {
    let end = end.min(MAX_POSITION);

    if beg >= end {
        return Vec::new();
    }

    let end = end - 1;
    let mut bins = vec![0];

    for level in 1..=5u32 {
        let offset = ((1usize << (3 * level)) - 1) / 7;
        let shift = 29 - 3 * level;

        for bin in (offset + (beg >> shift))..=(offset + (end >> shift)) {
            bins.push(bin as u32);
        }
    }

    bins
}
