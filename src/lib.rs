pub mod config;
pub mod error;
pub mod index;
pub mod interval;
pub mod reader;
pub mod resolve;
pub mod scan;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use index::BinIndex;
pub use interval::{GenomicInterval, IntervalEnd, optimize_intervals};
pub use reader::BamQueryReader;
pub use resolve::resolve_chunks;
pub use scan::{QueryRecords, UnmappedRecords};
pub use types::{QueryMode, ValidationStringency};
