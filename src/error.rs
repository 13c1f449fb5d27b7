use err_derive::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(display = "Degenerate box: {}", _0)]
    DegenerateBox(String),

    #[error(display = "Precondition failed: {}", _0)]
    Precondition(String),

    #[error(display = "Descriptor length mismatch: {} vs {}", _0, _1)]
    DimensionMismatch(usize, usize),

    #[error(display = "Degenerate vector: cosine similarity of a zero-norm descriptor")]
    DegenerateVector,

    #[error(display = "Unknown feature name: {:?}", _0)]
    UnknownFeature(String),

    #[error(display = "Stream read error: {}", _0)]
    StreamRead(serde_json::Error),

    #[error(display = "Config Error: {}", _0)]
    Config(serde_json::Error),

    #[error(display = "IO Error: {}", _0)]
    Io(std::io::Error),

    #[error(display = "Internal invariant violated: {}", _0)]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
