use std::io::{self, Read};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    error::TarError,
    header::{EntryHeader, EntryKind},
    parser::{Parser, Token},
    pax, Block, BLOCK_SIZE,
};

/// Callbacks invoked as archive entries are parsed
///
/// Every method defaults to a no-op; an unimplemented
/// [`EntrySink::on_file`] causes the file's data to be discarded without
/// being materialized.
pub trait EntrySink {
    /// Called for each file entry; `data` lazily yields its contents
    fn on_file(&mut self, header: &EntryHeader, data: &mut EntryData<'_>) -> Result<()> {
        let _ = (header, data);
        Ok(())
    }

    /// Called for each directory entry
    fn on_directory(&mut self, header: &EntryHeader) -> Result<()> {
        let _ = header;
        Ok(())
    }

    /// Called once after the archive terminator
    fn on_end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Lazily yields one file's contents during parsing
///
/// Chunks are pulled through the parser on demand, one block at a time,
/// so consuming a file never buffers more than 512 bytes. Also usable as
/// an [`io::Read`]. Whatever the callback leaves unconsumed is drained
/// and discarded by the reader.
pub struct EntryData<'a> {
    parser: &'a mut Parser,
    input:  &'a mut dyn Read,
    block:  Block,
    len:    usize,
    pos:    usize,
    done:   bool,
}

impl<'a> EntryData<'a> {
    fn new(parser: &'a mut Parser, input: &'a mut dyn Read, size: u64) -> EntryData<'a> {
        EntryData {
            parser,
            input,
            block: [0; BLOCK_SIZE],
            len: 0,
            pos: 0,
            done: size == 0,
        }
    }

    /// Pulls the next chunk of content, or `None` once exhausted
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>> {
        if self.pos < self.len {
            let start = self.pos;
            self.pos = self.len;
            return Ok(Some(&self.block[start..self.len]));
        }
        if self.done {
            return Ok(None);
        }
        self.fill()?;
        self.pos = self.len;
        Ok(Some(&self.block[..self.len]))
    }

    fn fill(&mut self) -> Result<()> {
        self.input
            .read_exact(&mut self.block)
            .context("unexpected end of archive input")?;
        match self.parser.write(&self.block)? {
            Some(Token::Data { bytes, end }) => {
                let len = bytes.len();
                self.len = len;
                self.pos = 0;
                self.done = end;
                Ok(())
            }
            _ => Err(TarError::UndefinedBehaviour(
                "file payload interrupted by a non-data token".to_string(),
            )
            .into()),
        }
    }

    fn drain(&mut self) -> Result<()> {
        while self.next_chunk()?.is_some() {}
        Ok(())
    }
}

impl Read for EntryData<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos == self.len {
            if self.done {
                return Ok(0);
            }
            self.fill()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
        let n = (self.len - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.block[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Reads a tar byte stream and dispatches its entries to a sink
///
/// The reader owns the input, assembles full 512-byte blocks from it,
/// reassembles PAX extended metadata, and invokes the sink's callbacks
/// in archive order. Parsing stops at the archive terminator; trailing
/// padding after it is left unread.
pub struct ArchiveReader<R: Read> {
    input:  R,
    parser: Parser,
}

impl<R: Read> ArchiveReader<R> {
    /// Wraps an input stream positioned at the start of an archive
    pub fn new(input: R) -> ArchiveReader<R> {
        ArchiveReader {
            input,
            parser: Parser::new(),
        }
    }

    /// Parses the whole archive, dispatching every entry to `sink`
    pub fn run(mut self, sink: &mut dyn EntrySink) -> Result<()> {
        let mut pending_path: Option<String> = None;
        let mut block: Block = [0; BLOCK_SIZE];
        loop {
            read_block(&mut self.input, &mut block)?;
            match self.parser.write(&block)? {
                None => continue,
                Some(Token::Header(mut header)) => match header.kind {
                    EntryKind::Extended => {
                        let payload =
                            collect_extended(&mut self.parser, &mut self.input, header.size)?;
                        let records = pax::decode_records(&payload)?;
                        if let Some(path) = records.get("path") {
                            pending_path = Some(path.clone());
                        }
                    }
                    EntryKind::Directory => {
                        if let Some(path) = pending_path.take() {
                            header.path = path;
                        }
                        debug!("directory {:?}", header.path);
                        sink.on_directory(&header)?;
                    }
                    EntryKind::File => {
                        if let Some(path) = pending_path.take() {
                            header.path = path;
                        }
                        debug!("file {:?} ({} bytes)", header.path, header.size);
                        let mut data =
                            EntryData::new(&mut self.parser, &mut self.input, header.size);
                        sink.on_file(&header, &mut data)?;
                        data.drain()?;
                    }
                },
                Some(Token::Data { .. }) => {
                    return Err(TarError::UndefinedBehaviour(
                        "stray data token between entries".to_string(),
                    )
                    .into())
                }
                Some(Token::End) => {
                    debug!("end of archive");
                    return sink.on_end();
                }
            }
        }
    }
}

fn collect_extended<R: Read>(parser: &mut Parser, input: &mut R, size: u64) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(size as usize);
    if size == 0 {
        return Ok(payload);
    }
    let mut block: Block = [0; BLOCK_SIZE];
    loop {
        read_block(input, &mut block)?;
        match parser.write(&block)? {
            Some(Token::Data { bytes, end }) => {
                payload.extend_from_slice(bytes);
                if end {
                    return Ok(payload);
                }
            }
            _ => {
                return Err(TarError::UndefinedBehaviour(
                    "extended header payload interrupted".to_string(),
                )
                .into())
            }
        }
    }
}

fn read_block<R: Read + ?Sized>(input: &mut R, block: &mut Block) -> Result<()> {
    input
        .read_exact(block)
        .context("unexpected end of archive input")
}
