use clap::Parser;
use std::path::PathBuf;

use crate::types::ValidationStringency;
use crate::{Error, Result};

#[derive(Debug, Clone, Parser)]
#[command(name = "bamqr")]
#[command(about = "coordinate-indexed queries over BAM alignment files")]
pub struct Config {
    /// BAM file to query
    pub bam: PathBuf,

    /// Index file (defaults to <bam>.bai next to the input)
    #[arg(long, env = "BAMQR_INDEX")]
    pub index: Option<PathBuf>,

    /// Region to query: "20:100009-100011", "20:100015-" (to end of the
    /// reference), "20:100009" (single position), or "20" (whole reference);
    /// repeatable
    #[arg(short, long = "region")]
    pub regions: Vec<String>,

    /// Match only records fully contained in the queried regions
    #[arg(long)]
    pub contained: bool,

    /// Stream the unmapped tail instead of querying regions
    #[arg(long)]
    pub unmapped: bool,

    /// Exact alignment start query, e.g. "20:100013"
    #[arg(long)]
    pub start_at: Option<String>,

    /// How to treat malformed records mid-scan
    #[arg(long, value_enum, default_value = "strict")]
    pub stringency: ValidationStringency,

    /// Emit records as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Only print the number of matching records
    #[arg(long)]
    pub count: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Parses a region spec into `(name, start, end)` raw coordinates, keeping
/// the `1`/`0` from-origin and to-end sentinels.
pub fn parse_region(spec: &str) -> Result<(String, i32, i32)> {
    let (name, range) = match spec.split_once(':') {
        Some((name, range)) => (name, Some(range)),
        None => (spec, None),
    };

    if name.is_empty() {
        return Err(Error::InvalidInterval(format!(
            "empty reference name in region: {spec}"
        )));
    }

    let parse = |token: &str| -> Result<i32> {
        token
            .parse::<i32>()
            .map_err(|_| Error::InvalidInterval(format!("invalid coordinate in region: {spec}")))
    };

    match range {
        None => Ok((name.to_string(), 1, 0)),
        Some(range) => match range.split_once('-') {
            Some((start, "")) => Ok((name.to_string(), parse(start)?, 0)),
            Some((start, end)) => Ok((name.to_string(), parse(start)?, parse(end)?)),
            None => {
                let position = parse(range)?;
                Ok((name.to_string(), position, position))
            }
        },
    }
}

/// Parses a "name:position" spec for exact-start queries.
pub fn parse_position(spec: &str) -> Result<(String, usize)> {
    let Some((name, position)) = spec.split_once(':') else {
        return Err(Error::InvalidInterval(format!(
            "expected name:position, got: {spec}"
        )));
    };

    let position = position
        .parse::<usize>()
        .map_err(|_| Error::InvalidInterval(format!("invalid position: {spec}")))?;

    Ok((name.to_string(), position))
}
