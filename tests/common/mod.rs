//! Test fixtures: coordinate-sorted BAM files written with the noodles
//! writer, plus hand-assembled BAI indexes built from the virtual positions
//! captured during the write.

use std::collections::BTreeMap;
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use noodles::bam;
use noodles::core::Position;
use noodles::sam::{self, alignment::RecordBuf};
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::op::{Kind, Op};
use noodles::sam::alignment::record_buf::{Cigar, QualityScores, Sequence};
use noodles::sam::header::record::value::{Map, map::ReferenceSequence};

pub struct Fixture {
    pub bam: PathBuf,
    pub bai: PathBuf,
}

pub fn header(references: &[(&str, usize)]) -> sam::Header {
    let mut builder = sam::Header::builder();

    for (name, length) in references {
        builder = builder.add_reference_sequence(
            *name,
            Map::<ReferenceSequence>::new(NonZeroUsize::new(*length).unwrap()),
        );
    }

    builder.build()
}

pub fn mapped(name: &str, reference_sequence_id: usize, start: usize, len: usize) -> RecordBuf {
    let mut record = RecordBuf::default();

    *record.name_mut() = Some(name.into());
    *record.flags_mut() = Flags::empty();
    *record.reference_sequence_id_mut() = Some(reference_sequence_id);
    *record.alignment_start_mut() = Some(Position::try_from(start).unwrap());
    *record.cigar_mut() = Cigar::from(vec![Op::new(Kind::Match, len)]);
    *record.sequence_mut() = Sequence::from(vec![b'A'; len]);
    *record.quality_scores_mut() = QualityScores::from(vec![30u8; len]);

    record
}

pub fn paired(
    name: &str,
    reference_sequence_id: usize,
    start: usize,
    len: usize,
    first: bool,
    mate_start: usize,
) -> RecordBuf {
    let mut record = mapped(name, reference_sequence_id, start, len);

    let mut flags = Flags::SEGMENTED | Flags::PROPERLY_SEGMENTED;
    flags.insert(if first {
        Flags::FIRST_SEGMENT
    } else {
        Flags::LAST_SEGMENT
    });

    *record.flags_mut() = flags;
    *record.mate_reference_sequence_id_mut() = Some(reference_sequence_id);
    *record.mate_alignment_start_mut() = Some(Position::try_from(mate_start).unwrap());

    record
}

pub fn unmapped(name: &str, seq_len: usize) -> RecordBuf {
    let mut record = RecordBuf::default();

    *record.name_mut() = Some(name.into());
    *record.flags_mut() = Flags::UNMAPPED;
    *record.sequence_mut() = Sequence::from(vec![b'N'; seq_len]);
    *record.quality_scores_mut() = QualityScores::from(vec![2u8; seq_len]);

    record
}

/// Writes `<stem>.bam` and `<stem>.bam.bai` under `dir`. Records must be in
/// coordinate order with unmapped records last.
pub fn write_fixture(
    dir: &Path,
    stem: &str,
    header: &sam::Header,
    records: &[RecordBuf],
) -> Fixture {
    let bam_path = dir.join(format!("{stem}.bam"));
    let bai_path = dir.join(format!("{stem}.bam.bai"));

    let mut placements = Vec::with_capacity(records.len());

    {
        let mut writer = bam::io::Writer::new(File::create(&bam_path).unwrap());
        writer.write_header(header).unwrap();

        for record in records {
            let start = u64::from(writer.get_ref().virtual_position());
            writer.write_alignment_record(header, record).unwrap();
            let end = u64::from(writer.get_ref().virtual_position());
            placements.push((record.clone(), start, end));
        }
    } // dropping the writer emits the BGZF EOF block

    write_bai(
        &bai_path,
        header.reference_sequences().len(),
        &placements,
    );

    Fixture {
        bam: bam_path,
        bai: bai_path,
    }
}

struct ReferenceIndex {
    bins: BTreeMap<u32, Vec<(u64, u64)>>,
    linear: Vec<u64>,
    ref_beg: u64,
    ref_end: u64,
    mapped_count: u64,
}

fn write_bai(path: &Path, reference_count: usize, placements: &[(RecordBuf, u64, u64)]) {
    let mut references: Vec<ReferenceIndex> = (0..reference_count)
        .map(|_| ReferenceIndex {
            bins: BTreeMap::new(),
            linear: Vec::new(),
            ref_beg: u64::MAX,
            ref_end: 0,
            mapped_count: 0,
        })
        .collect();

    let mut no_coordinate_count = 0u64;

    for (record, start, end) in placements {
        let Some(reference_sequence_id) = record.reference_sequence_id() else {
            no_coordinate_count += 1;
            continue;
        };

        let beg = usize::from(record.alignment_start().unwrap()) - 1;
        let stop = record
            .alignment_end()
            .map(usize::from)
            .unwrap_or(beg + 1); // 0-based exclusive

        let reference = &mut references[reference_sequence_id];

        reference
            .bins
            .entry(reg2bin(beg, stop))
            .or_default()
            .push((*start, *end));

        let last_window = (stop - 1) >> 14;
        if reference.linear.len() <= last_window {
            reference.linear.resize(last_window + 1, 0);
        }
        for window in (beg >> 14)..=last_window {
            if reference.linear[window] == 0 || *start < reference.linear[window] {
                reference.linear[window] = *start;
            }
        }

        reference.ref_beg = reference.ref_beg.min(*start);
        reference.ref_end = reference.ref_end.max(*end);
        reference.mapped_count += 1;
    }

    let mut buf: Vec<u8> = Vec::new();

    buf.extend_from_slice(b"BAI\x01");
    buf.extend_from_slice(&(reference_count as i32).to_le_bytes());

    for reference in &references {
        if reference.mapped_count == 0 {
            buf.extend_from_slice(&0i32.to_le_bytes()); // n_bin
            buf.extend_from_slice(&0i32.to_le_bytes()); // n_intv
            continue;
        }

        buf.extend_from_slice(&((reference.bins.len() + 1) as i32).to_le_bytes());

        for (bin, chunks) in &reference.bins {
            buf.extend_from_slice(&bin.to_le_bytes());
            buf.extend_from_slice(&(chunks.len() as i32).to_le_bytes());
            for (start, end) in chunks {
                buf.extend_from_slice(&start.to_le_bytes());
                buf.extend_from_slice(&end.to_le_bytes());
            }
        }

        // metadata pseudo-bin
        buf.extend_from_slice(&37450u32.to_le_bytes());
        buf.extend_from_slice(&2i32.to_le_bytes());
        buf.extend_from_slice(&reference.ref_beg.to_le_bytes());
        buf.extend_from_slice(&reference.ref_end.to_le_bytes());
        buf.extend_from_slice(&reference.mapped_count.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());

        buf.extend_from_slice(&(reference.linear.len() as i32).to_le_bytes());
        for offset in &reference.linear {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
    }

    buf.extend_from_slice(&no_coordinate_count.to_le_bytes());

    std::fs::write(path, buf).unwrap();
}

// standard hierarchical binning: deepest bin containing [beg, stop)
fn reg2bin(beg: usize, stop: usize) -> u32 {
    let stop = stop - 1;

    if beg >> 14 == stop >> 14 {
        return (((1 << 15) - 1) / 7 + (beg >> 14)) as u32;
    }
    if beg >> 17 == stop >> 17 {
        return (((1 << 12) - 1) / 7 + (beg >> 17)) as u32;
    }
    if beg >> 20 == stop >> 20 {
        return (((1 << 9) - 1) / 7 + (beg >> 20)) as u32;
    }
    if beg >> 23 == stop >> 23 {
        return (((1 << 6) - 1) / 7 + (beg >> 23)) as u32;
    }
    if beg >> 26 == stop >> 26 {
        return (((1 << 3) - 1) / 7 + (beg >> 26)) as u32;
    }

    0
}

/// Seven mapped reads (five singletons plus the `f` pair) and five unmapped
/// reads on a single reference.
pub fn single_reference_fixture(dir: &Path) -> Fixture {
    let header = header(&[("20", 200_000)]);

    let records = vec![
        mapped("a", 0, 100_001, 120),
        mapped("b", 0, 100_005, 146),
        mapped("c", 0, 100_009, 122),
        mapped("d", 0, 100_010, 101),
        mapped("e", 0, 100_011, 80),
        paired("f", 0, 100_013, 2, true, 100_013),
        paired("f", 0, 100_013, 58, false, 100_013),
        unmapped("g", 8),
        unmapped("h", 8),
        unmapped("h", 8),
        unmapped("i", 8),
        unmapped("i", 8),
    ];

    write_fixture(dir, "single_ref", &header, &records)
}

/// Eleven mapped reads spread over four references, no unmapped tail.
pub fn multi_reference_fixture(dir: &Path) -> Fixture {
    let header = header(&[
        ("ref0", 10_000),
        ("ref1", 10_000),
        ("ref2", 10_000),
        ("ref3", 10_000),
    ]);

    let records = vec![
        mapped("a", 0, 200, 76),
        mapped("b", 0, 205, 76),
        mapped("c", 0, 230, 70),
        mapped("d", 0, 1_025, 51),
        mapped("e", 1, 400, 51),
        mapped("f", 1, 500, 77),
        mapped("g", 2, 100, 51),
        mapped("h", 2, 200, 51),
        mapped("i", 2, 300, 77),
        mapped("j", 3, 600, 51),
        mapped("k", 3, 700, 77),
    ];

    write_fixture(dir, "multi_ref", &header, &records)
}

/// Header only, no records at all.
pub fn empty_fixture(dir: &Path) -> Fixture {
    let header = header(&[("ref0", 10_000), ("ref1", 10_000)]);
    write_fixture(dir, "empty", &header, &[])
}

/// A short mapped prefix followed by `unmapped_count` unmapped reads bulky
/// enough to spread the tail over several BGZF blocks.
pub fn unmapped_tail_fixture(dir: &Path, unmapped_count: usize) -> Fixture {
    let header = header(&[("ref0", 100_000)]);

    let mut records = Vec::with_capacity(10 + unmapped_count);
    for i in 0..10 {
        records.push(mapped(&format!("m{i}"), 0, 1_000 + i * 100, 76));
    }
    for i in 0..unmapped_count {
        records.push(unmapped(&format!("u{i}"), 512));
    }

    write_fixture(dir, "unmapped_tail", &header, &records)
}
