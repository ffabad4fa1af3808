use crate::{
    error::TarError,
    header::{self, EntryKind, FileStat, MAX_PATH, PAX_HEADER_NAME},
    Block, BLOCK_SIZE,
};

#[derive(Debug, Clone, Copy)]
enum State {
    Header,
    Data { remaining: u64, extended: bool },
    Null,
    Ended,
}

/// Streaming producer of tar blocks
///
/// Each call emits exactly one 512-byte block. Entries are written as a
/// header followed by their data chunks; the archive is sealed with two
/// [`Generator::end`] calls. Paths over 255 bytes must be preceded by a
/// PAX extended header carrying the full path, after which the entry
/// itself may be given an empty path.
pub struct Generator {
    state:       State,
    pax_pending: bool,
}

impl Generator {
    /// Creates a generator ready for its first header
    pub fn new() -> Generator {
        Generator {
            state:       State::Header,
            pax_pending: false,
        }
    }

    /// Emits the header block for a regular file
    pub fn file(&mut self, path: &str, stat: &FileStat) -> Result<Block, TarError> {
        self.expect_header("file header")?;
        self.check_path(path)?;
        let block = header::encode(path, stat, EntryKind::File)?;
        self.pax_pending = false;
        self.state = if stat.size > 0 {
            State::Data {
                remaining: stat.size,
                extended:  false,
            }
        } else {
            State::Header
        };
        Ok(block)
    }

    /// Emits the header block for a directory
    ///
    /// The stored path always ends with `/` and the stored size is 0, no
    /// matter what the stat says.
    pub fn directory(&mut self, path: &str, stat: &FileStat) -> Result<Block, TarError> {
        self.expect_header("directory header")?;
        let stored = if path.is_empty() || path.ends_with('/') {
            path.to_owned()
        } else {
            format!("{}/", path)
        };
        self.check_path(&stored)?;
        let stat = FileStat {
            size: 0,
            ..stat.clone()
        };
        let block = header::encode(&stored, &stat, EntryKind::Directory)?;
        self.pax_pending = false;
        Ok(block)
    }

    /// Emits a PAX extended header announcing `size` bytes of records
    pub fn extended(&mut self, size: u64) -> Result<Block, TarError> {
        self.expect_header("extended header")?;
        if size == 0 {
            return Err(TarError::InvalidStat("empty extended header".to_string()));
        }
        let stat = FileStat {
            size,
            ..FileStat::default()
        };
        let block = header::encode(PAX_HEADER_NAME, &stat, EntryKind::Extended)?;
        self.state = State::Data {
            remaining: size,
            extended:  true,
        };
        Ok(block)
    }

    /// Emits one data block, zero-padding the final chunk
    ///
    /// The chunk must be exactly `min(remaining, 512)` bytes: full blocks
    /// until the tail, then exactly the leftover byte count.
    pub fn data(&mut self, chunk: &[u8]) -> Result<Block, TarError> {
        let (remaining, extended) = match self.state {
            State::Data { remaining, extended } => (remaining, extended),
            _ => {
                return Err(TarError::InvalidState(
                    "data block outside an entry body".to_string(),
                ))
            }
        };
        if chunk.is_empty() || chunk.len() > BLOCK_SIZE {
            return Err(TarError::BlockSize(chunk.len()));
        }
        let expected = remaining.min(BLOCK_SIZE as u64) as usize;
        if chunk.len() != expected {
            return Err(TarError::InvalidState(format!(
                "expected a data chunk of {} bytes, got {}",
                expected,
                chunk.len()
            )));
        }

        let mut block: Block = [0; BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);

        if remaining <= BLOCK_SIZE as u64 {
            self.state = State::Header;
            self.pax_pending = extended;
        } else {
            self.state = State::Data {
                remaining: remaining - BLOCK_SIZE as u64,
                extended,
            };
        }
        Ok(block)
    }

    /// Emits one null block; the second call seals the archive
    pub fn end(&mut self) -> Result<Block, TarError> {
        match self.state {
            State::Header => self.state = State::Null,
            State::Null => self.state = State::Ended,
            State::Data { .. } => {
                return Err(TarError::InvalidState(
                    "archive end inside an entry body".to_string(),
                ))
            }
            State::Ended => {
                return Err(TarError::InvalidState("archive already ended".to_string()))
            }
        }
        Ok([0; BLOCK_SIZE])
    }

    fn expect_header(&self, op: &str) -> Result<(), TarError> {
        match self.state {
            State::Header => Ok(()),
            State::Data { .. } => Err(TarError::InvalidState(format!(
                "{} inside an entry body",
                op
            ))),
            State::Null | State::Ended => Err(TarError::InvalidState(format!(
                "{} after the archive terminator",
                op
            ))),
        }
    }

    // An empty or oversized path is only legal right after a PAX extended
    // header has carried the real one.
    fn check_path(&self, path: &str) -> Result<(), TarError> {
        if self.pax_pending {
            return Ok(());
        }
        if path.is_empty() {
            Err(TarError::InvalidFileName("empty path".to_string()))
        } else if path.len() > MAX_PATH {
            Err(TarError::InvalidFileName(format!(
                "path of {} bytes needs a preceding extended header",
                path.len()
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}
