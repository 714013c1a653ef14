//! Indexed BAM reader exposing the coordinate query surface.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use noodles::bam::{self, bai};
use noodles::core::Position;
use noodles::sam;
use noodles::sam::alignment::RecordBuf;

use crate::index::BinIndex;
use crate::interval::{GenomicInterval, optimize_intervals};
use crate::resolve::resolve_chunks;
use crate::scan::{QueryRecords, UnmappedRecords};
use crate::types::{QueryMode, ValidationStringency};
use crate::{Error, Result};

/// Read handle over a coordinate-sorted BAM file and its binning index.
///
/// The handle itself holds no cursor: every query opens an independent file
/// handle for its iterator, so any number of query iterators may be live at
/// once and queries take `&self`.
pub struct BamQueryReader {
    path: PathBuf,
    header: sam::Header,
    index: BinIndex,
    stringency: ValidationStringency,
}

impl BamQueryReader {
    /// Opens a BAM file, locating its index next to it (`<path>.bai`, then
    /// the `.bai`-swapped extension).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let index_path = find_index(path)?;
        Self::open_with_index(path, index_path)
    }

    /// Opens a BAM file with an explicit index path.
    pub fn open_with_index<P, Q>(path: P, index_path: Q) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path = path.as_ref().to_path_buf();

        let mut reader = bam::io::Reader::new(File::open(&path)?);
        let header = reader.read_header()?;

        let bai_index = bai::io::Reader::new(BufReader::new(File::open(index_path.as_ref())?))
            .read_index()?;
        let index = BinIndex::from_bai(&bai_index);

        tracing::debug!(
            path = %path.display(),
            references = index.reference_count(),
            "opened indexed alignment file"
        );

        Ok(Self {
            path,
            header,
            index,
            stringency: ValidationStringency::default(),
        })
    }

    /// Sets how malformed records encountered mid-scan are treated.
    pub fn with_validation_stringency(mut self, stringency: ValidationStringency) -> Self {
        self.stringency = stringency;
        self
    }

    pub fn header(&self) -> &sam::Header {
        &self.header
    }

    pub fn index(&self) -> &BinIndex {
        &self.index
    }

    pub fn validation_stringency(&self) -> ValidationStringency {
        self.stringency
    }

    /// Resolves a reference sequence name to its id via the header.
    pub fn reference_sequence_id(&self, reference_name: &str) -> Result<usize> {
        self.header
            .reference_sequences()
            .get_index_of(reference_name.as_bytes())
            .ok_or_else(|| Error::UnresolvedReference(reference_name.into()))
    }

    /// Builds an interval from a reference name and raw coordinates honoring
    /// the `start <= 1` / `end == 0` sentinels.
    pub fn interval(&self, reference_name: &str, start: i32, end: i32) -> Result<GenomicInterval> {
        let reference_sequence_id = self.reference_sequence_id(reference_name)?;
        GenomicInterval::from_raw(reference_sequence_id as i32, start, end)
    }

    /// Single query entry point, parameterized by containment mode.
    pub fn query(
        &self,
        intervals: Vec<GenomicInterval>,
        mode: QueryMode,
    ) -> Result<QueryRecords<'_>> {
        self.build_query(intervals, mode, None)
    }

    /// Records whose span intersects any of the intervals.
    pub fn query_overlapping(&self, intervals: Vec<GenomicInterval>) -> Result<QueryRecords<'_>> {
        self.query(intervals, QueryMode::Overlapping)
    }

    /// Records whose span lies fully inside some interval.
    pub fn query_contained(&self, intervals: Vec<GenomicInterval>) -> Result<QueryRecords<'_>> {
        self.query(intervals, QueryMode::Contained)
    }

    /// Name-based convenience for a single-interval query.
    pub fn query_region(
        &self,
        reference_name: &str,
        start: i32,
        end: i32,
        mode: QueryMode,
    ) -> Result<QueryRecords<'_>> {
        let interval = self.interval(reference_name, start, end)?;
        self.query(vec![interval], mode)
    }

    /// Records whose alignment starts exactly at `position`.
    pub fn query_alignment_start(
        &self,
        reference_name: &str,
        position: usize,
    ) -> Result<QueryRecords<'_>> {
        let reference_sequence_id = self.reference_sequence_id(reference_name)?;
        let position = Position::try_from(position)
            .map_err(|_| Error::InvalidInterval(format!("invalid position: {position}")))?;

        self.build_query(
            vec![GenomicInterval::at(reference_sequence_id, position)],
            QueryMode::Overlapping,
            Some(position),
        )
    }

    /// The unmapped tail of the file; empty when the index has no mapped
    /// data to mark its end.
    pub fn query_unmapped(&self) -> Result<UnmappedRecords<'_>> {
        let file = match self.index.unmapped_start() {
            Some(start) => Some((File::open(&self.path)?, start)),
            None => None,
        };

        UnmappedRecords::open(file, &self.header, self.stringency)
    }

    /// Locates the mate of a paired record via a fresh index query at the
    /// mate's coordinates. Returns `Ok(None)` when the record is unpaired or
    /// no mate can be found; absence is not an error.
    pub fn query_mate(&self, record: &RecordBuf) -> Result<Option<RecordBuf>> {
        let flags = record.flags();

        if !flags.is_segmented() {
            return Ok(None);
        }

        match (
            record.mate_reference_sequence_id(),
            record.mate_alignment_start(),
        ) {
            (Some(mate_reference_sequence_id), Some(mate_start)) => {
                let interval = GenomicInterval::at(mate_reference_sequence_id, mate_start);
                let candidates =
                    self.build_query(vec![interval], QueryMode::Overlapping, Some(mate_start))?;

                for candidate in candidates {
                    let candidate = candidate?;
                    if is_mate_of(record, &candidate) {
                        return Ok(Some(candidate));
                    }
                }

                Ok(None)
            }
            // mate flagged unmapped without coordinates: walk the unmapped tail
            _ if flags.is_mate_unmapped() => {
                for candidate in self.query_unmapped()? {
                    let candidate = candidate?;
                    let candidate_flags = candidate.flags();

                    if candidate_flags.is_segmented()
                        && !candidate_flags.is_secondary()
                        && !candidate_flags.is_supplementary()
                        && candidate.name() == record.name()
                        && candidate_flags.is_first_segment() != flags.is_first_segment()
                    {
                        return Ok(Some(candidate));
                    }
                }

                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn build_query(
        &self,
        intervals: Vec<GenomicInterval>,
        mode: QueryMode,
        exact_start: Option<Position>,
    ) -> Result<QueryRecords<'_>> {
        let intervals = optimize_intervals(intervals);
        let chunks = resolve_chunks(&intervals, &self.index);

        tracing::debug!(
            intervals = intervals.len(),
            chunks = chunks.len(),
            "resolved query regions"
        );

        let file = if chunks.is_empty() {
            None
        } else {
            Some(File::open(&self.path)?)
        };

        QueryRecords::open(
            file,
            chunks,
            &self.header,
            intervals,
            mode,
            exact_start,
            self.stringency,
        )
    }
}

/// A mate candidate must be the other end of the same template: paired,
/// primary, same name, opposite first/last segment flag, and pointing back at
/// the original record's position. The last two conditions exclude the
/// queried record itself when both mates sit on one coordinate.
fn is_mate_of(record: &RecordBuf, candidate: &RecordBuf) -> bool {
    let flags = candidate.flags();

    flags.is_segmented()
        && !flags.is_secondary()
        && !flags.is_supplementary()
        && candidate.name() == record.name()
        && flags.is_first_segment() != record.flags().is_first_segment()
        && candidate.mate_reference_sequence_id() == record.reference_sequence_id()
        && candidate.mate_alignment_start() == record.alignment_start()
}

fn find_index(path: &Path) -> Result<PathBuf> {
    let mut appended = path.as_os_str().to_owned();
    appended.push(".bai");
    let appended = PathBuf::from(appended);

    if appended.exists() {
        return Ok(appended);
    }

    let swapped = path.with_extension("bai");
    if swapped.exists() {
        return Ok(swapped);
    }

    Err(Error::InvalidIndex(format!(
        "no index found for {}",
        path.display()
    )))
}
