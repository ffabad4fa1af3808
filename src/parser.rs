use crate::{
    error::TarError,
    header::{self, EntryHeader, EntryKind},
    BLOCK_SIZE,
};

#[derive(Debug, Clone, Copy)]
enum State {
    Header,
    Data { remaining: u64 },
    Null,
    Ended,
}

/// One parsed unit of the block stream
#[derive(Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// Metadata for the entry that follows
    Header(EntryHeader),
    /// A slice of file or extended-header payload
    Data {
        /// The block, truncated to its meaningful length
        bytes: &'a [u8],
        /// True on the last data block of the current entry
        end:   bool,
    },
    /// The archive terminator was seen
    End,
}

/// Streaming consumer of tar blocks
///
/// Fed one 512-byte block at a time, returning at most one token per
/// block. The first all-zero terminator block returns nothing; the
/// second returns [`Token::End`], after which any further write is an
/// error. Data tokens borrow the caller's block and must be copied if
/// they are to outlive the next write.
pub struct Parser {
    state: State,
}

impl Parser {
    /// Creates a parser ready for the first header block
    pub fn new() -> Parser {
        Parser { state: State::Header }
    }

    /// Consumes one block, returning the token it produced, if any
    pub fn write<'a>(&mut self, block: &'a [u8]) -> Result<Option<Token<'a>>, TarError> {
        if block.len() != BLOCK_SIZE {
            return Err(TarError::BlockSize(block.len()));
        }
        match self.state {
            State::Header => {
                if is_null(block) {
                    self.state = State::Null;
                    return Ok(None);
                }
                let header = header::decode(block)?;
                if matches!(header.kind, EntryKind::File | EntryKind::Extended)
                    && header.size > 0
                {
                    self.state = State::Data {
                        remaining: header.size,
                    };
                }
                Ok(Some(Token::Header(header)))
            }
            State::Data { remaining } => {
                let useful = remaining.min(BLOCK_SIZE as u64) as usize;
                let end = remaining <= BLOCK_SIZE as u64;
                self.state = if end {
                    State::Header
                } else {
                    State::Data {
                        remaining: remaining - BLOCK_SIZE as u64,
                    }
                };
                Ok(Some(Token::Data {
                    bytes: &block[..useful],
                    end,
                }))
            }
            State::Null => {
                if is_null(block) {
                    self.state = State::Ended;
                    Ok(Some(Token::End))
                } else {
                    Err(TarError::EndOfArchive)
                }
            }
            State::Ended => Err(TarError::EndOfArchive),
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

fn is_null(block: &[u8]) -> bool {
    block.iter().all(|b| *b == 0)
}
