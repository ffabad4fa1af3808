use thiserror::Error;

/// An error enum for return from codec methods that may fail
#[derive(Error, Debug)]
pub enum TarError {
    /// A header block failed validation while parsing
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// A block or data chunk had an impossible length
    #[error("bad block length: {0} bytes")]
    BlockSize(usize),
    /// Entry metadata exceeds what the header fields can hold
    #[error("invalid stat: {0}")]
    InvalidStat(String),
    /// Entry path is empty or too long for the header fields
    #[error("invalid file name: {0}")]
    InvalidFileName(String),
    /// Operation is illegal in the current generator or parser state
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Input continued after the archive terminator
    #[error("end of archive")]
    EndOfArchive,
    /// A branch that should be unreachable was taken
    #[error("undefined behaviour: {0}")]
    UndefinedBehaviour(String),
}
