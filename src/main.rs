use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noodles::sam;
use noodles::sam::alignment::RecordBuf;

use bamqr::{
    BamQueryReader, Config, QueryMode,
    config::{parse_position, parse_region},
};

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let reader = match &config.index {
        Some(index) => BamQueryReader::open_with_index(&config.bam, index)?,
        None => BamQueryReader::open(&config.bam)?,
    }
    .with_validation_stringency(config.stringency);

    let mut emitted = 0usize;

    if config.unmapped {
        for record in reader.query_unmapped()? {
            emit(reader.header(), &record?, &config, &mut emitted)?;
        }
    } else if let Some(spec) = &config.start_at {
        let (name, position) = parse_position(spec)?;
        for record in reader.query_alignment_start(&name, position)? {
            emit(reader.header(), &record?, &config, &mut emitted)?;
        }
    } else {
        let mut intervals = Vec::with_capacity(config.regions.len());
        for spec in &config.regions {
            let (name, start, end) = parse_region(spec)?;
            intervals.push(reader.interval(&name, start, end)?);
        }

        let mode = QueryMode::from_contained_flag(config.contained);
        for record in reader.query(intervals, mode)? {
            emit(reader.header(), &record?, &config, &mut emitted)?;
        }
    }

    if config.count {
        println!("{emitted}");
    }

    tracing::info!(records = emitted, "query complete");

    Ok(())
}

#[derive(Debug, Serialize)]
struct RecordSummary<'a> {
    name: Option<&'a str>,
    flags: u16,
    reference_name: Option<&'a str>,
    start: Option<usize>,
    end: Option<usize>,
    mate_reference_name: Option<&'a str>,
    mate_start: Option<usize>,
}

impl<'a> RecordSummary<'a> {
    fn new(header: &'a sam::Header, record: &'a RecordBuf) -> Self {
        let reference_name = |id: Option<usize>| {
            id.and_then(|id| header.reference_sequences().get_index(id))
                .and_then(|(name, _)| std::str::from_utf8(name.as_ref()).ok())
        };

        Self {
            name: record
                .name()
                .and_then(|name| std::str::from_utf8(name.as_ref()).ok()),
            flags: record.flags().bits(),
            reference_name: reference_name(record.reference_sequence_id()),
            start: record.alignment_start().map(usize::from),
            end: record.alignment_end().map(usize::from),
            mate_reference_name: reference_name(record.mate_reference_sequence_id()),
            mate_start: record.mate_alignment_start().map(usize::from),
        }
    }
}

fn emit(
    header: &sam::Header,
    record: &RecordBuf,
    config: &Config,
    emitted: &mut usize,
) -> anyhow::Result<()> {
    *emitted += 1;

    if config.count {
        return Ok(());
    }

    let summary = RecordSummary::new(header, record);

    if config.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            summary.name.unwrap_or("*"),
            summary.flags,
            summary.reference_name.unwrap_or("*"),
            summary.start.map_or_else(|| "0".to_string(), |p| p.to_string()),
            summary.end.map_or_else(|| "0".to_string(), |p| p.to_string()),
        );
    }

    Ok(())
}
