pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("reference sequence not found: {0}")]
    UnresolvedReference(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
