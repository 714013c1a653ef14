//! Record streaming over resolved file regions.
//!
//! Chunk resolution is a superset of the exact answer, so every decoded
//! record is re-checked against the interval set here; the predicate is the
//! correctness boundary, not an optimization. Regions are scanned in
//! ascending virtual-offset order and are disjoint after coalescing, which
//! preserves the file's coordinate order and rules out duplicate emission
//! when a record satisfies more than one interval.
//!
//! Each iterator owns its file handle, BGZF cursor, and decode buffer, so
//! any number of them can be live on one reader at a time. Resources are
//! released as soon as the scan ends, on [`close`](QueryRecords::close), or
//! on drop.

use std::fs::File;
use std::io;

use noodles::bam;
use noodles::bgzf;
use noodles::core::Position;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::sam;
use noodles::sam::alignment::RecordBuf;

use crate::interval::GenomicInterval;
use crate::types::{QueryMode, ValidationStringency};
use crate::{Error, Result};

type InnerReader = bam::io::Reader<bgzf::Reader<File>>;

/// Lazy, single-pass stream of records matching a coordinate query.
pub struct QueryRecords<'r> {
    reader: Option<InnerReader>,
    chunks: Vec<Chunk>,
    current: usize,
    header: &'r sam::Header,
    intervals: Vec<GenomicInterval>,
    mode: QueryMode,
    exact_start: Option<Position>,
    stringency: ValidationStringency,
    record: bam::Record,
}

impl<'r> QueryRecords<'r> {
    pub(crate) fn open(
        file: Option<File>,
        chunks: Vec<Chunk>,
        header: &'r sam::Header,
        intervals: Vec<GenomicInterval>,
        mode: QueryMode,
        exact_start: Option<Position>,
        stringency: ValidationStringency,
    ) -> Result<Self> {
        let reader = match (file, chunks.first()) {
            (Some(file), Some(first)) => {
                let mut reader = bam::io::Reader::from(bgzf::Reader::new(file));
                reader.get_mut().seek(first.start())?;
                Some(reader)
            }
            _ => None,
        };

        Ok(Self {
            reader,
            chunks,
            current: 0,
            header,
            intervals,
            mode,
            exact_start,
            stringency,
            record: bam::Record::default(),
        })
    }

    /// Releases the file handle and decode buffers; subsequent `next` calls
    /// return `None`. Also happens automatically on exhaustion and on drop.
    pub fn close(&mut self) {
        self.reader = None;
        self.chunks.clear();
    }
}

impl Iterator for QueryRecords<'_> {
    type Item = Result<RecordBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;

            // advance to the next region once the cursor passes the current one
            while reader.get_ref().virtual_position() >= self.chunks[self.current].end() {
                self.current += 1;

                match self.chunks.get(self.current) {
                    Some(chunk) => {
                        if let Err(e) = reader.get_mut().seek(chunk.start()) {
                            self.close();
                            return Some(Err(e.into()));
                        }
                    }
                    None => {
                        self.close();
                        return None;
                    }
                }
            }

            match reader.read_record(&mut self.record) {
                Ok(0) => {
                    self.close();
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.close();
                    return Some(Err(e.into()));
                }
            }

            match RecordBuf::try_from_alignment_record(self.header, &self.record) {
                Ok(record) => {
                    if record_matches(&self.intervals, self.mode, self.exact_start, &record) {
                        return Some(Ok(record));
                    }
                }
                Err(e) => {
                    if let Some(fatal) = handle_malformed(self.stringency, &e) {
                        self.close();
                        return Some(Err(fatal));
                    }
                }
            }
        }
    }
}

/// Lazy stream over the unmapped tail of the file.
///
/// Starts at the index's unmapped-start marker and decodes to end-of-data.
/// Mapped records before the true start of the tail are skipped, and BGZF
/// reading crosses block boundaries transparently, so unmapped runs spread
/// over many physical blocks come back complete.
pub struct UnmappedRecords<'r> {
    reader: Option<InnerReader>,
    header: &'r sam::Header,
    stringency: ValidationStringency,
    record: bam::Record,
}

impl<'r> UnmappedRecords<'r> {
    pub(crate) fn open(
        file: Option<(File, bgzf::VirtualPosition)>,
        header: &'r sam::Header,
        stringency: ValidationStringency,
    ) -> Result<Self> {
        let reader = match file {
            Some((file, start)) => {
                let mut reader = bam::io::Reader::from(bgzf::Reader::new(file));
                reader.get_mut().seek(start)?;
                Some(reader)
            }
            None => None,
        };

        Ok(Self {
            reader,
            header,
            stringency,
            record: bam::Record::default(),
        })
    }

    /// See [`QueryRecords::close`].
    pub fn close(&mut self) {
        self.reader = None;
    }
}

impl Iterator for UnmappedRecords<'_> {
    type Item = Result<RecordBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;

            match reader.read_record(&mut self.record) {
                Ok(0) => {
                    self.close();
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.close();
                    return Some(Err(e.into()));
                }
            }

            match RecordBuf::try_from_alignment_record(self.header, &self.record) {
                Ok(record) => {
                    if record.flags().is_unmapped() {
                        return Some(Ok(record));
                    }
                }
                Err(e) => {
                    if let Some(fatal) = handle_malformed(self.stringency, &e) {
                        self.close();
                        return Some(Err(fatal));
                    }
                }
            }
        }
    }
}

/// Exact predicate applied to every decoded record.
pub(crate) fn record_matches(
    intervals: &[GenomicInterval],
    mode: QueryMode,
    exact_start: Option<Position>,
    record: &RecordBuf,
) -> bool {
    let Some(reference_sequence_id) = record.reference_sequence_id() else {
        return false;
    };
    let Some(start) = record.alignment_start() else {
        return false;
    };
    let end = record.alignment_end().unwrap_or(start);

    if let Some(expected) = exact_start
        && start != expected
    {
        return false;
    }

    intervals.iter().any(|interval| match mode {
        QueryMode::Overlapping => interval.overlaps_span(reference_sequence_id, start, end),
        QueryMode::Contained => interval.contains_span(reference_sequence_id, start, end),
    })
}

/// Applies the stringency policy to a record-level decode failure. Returns
/// the error to surface when the scan must abort.
fn handle_malformed(stringency: ValidationStringency, e: &io::Error) -> Option<Error> {
    match stringency {
        ValidationStringency::Strict => Some(Error::MalformedRecord(e.to_string())),
        ValidationStringency::Lenient => {
            tracing::warn!(error = %e, "skipping malformed record");
            None
        }
        ValidationStringency::Silent => None,
    }
}
