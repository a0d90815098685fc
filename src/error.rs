use thiserror::Error;

/// Row-local pipeline failures. None of these stop the watcher; each row
/// either ends enriched or is left alone with its original content.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("no usable instructor name after normalization")]
    NameParseEmpty,

    #[error("boundary transport failed: {0}")]
    Transport(String),

    #[error("ratings service returned {status}: {detail}")]
    Service { status: u16, detail: String },

    #[error("no record for {name} at {institution}")]
    NoMatch { name: String, institution: String },

    #[error("target cell removed before render")]
    TargetGone,
}
