//! Error types for the planner core, the state codec and the local store.

/// A share token or persisted record that could not be turned back into a value.
///
/// These never reach the user: the loader logs them and falls back to the
/// next source.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token does not decode to UTF-8 text")]
    Utf8,

    #[error("token payload does not match the expected shape: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not build the share query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not access the local store: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not serialize the local store: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the local store lock was poisoned")]
    Poisoned,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not flush CSV output: {0}")]
    Flush(String),
}

/// An edit that the planner refuses to apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The household must always keep at least one member.
    #[error("the last remaining member cannot be removed")]
    LastMember,

    #[error("no member with id \"{0}\"")]
    UnknownMember(String),

    #[error("no one-off event with id \"{0}\"")]
    UnknownOneOff(String),
}
