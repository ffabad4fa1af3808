use std::{
    collections::VecDeque,
    io::{Read, Write},
};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    error::TarError,
    generator::Generator,
    header::{FileStat, MAX_PATH},
    pax, Block, BLOCK_SIZE,
};

/// Content supplied for a file entry
pub enum FileContent {
    /// Literal bytes; the entry size is the buffer length
    Bytes(Vec<u8>),
    /// UTF-8 text; the entry size is the encoded length
    Text(String),
    /// Streamed content; must yield exactly the size declared in the stat
    Stream(Box<dyn Read>),
}

enum Source {
    Buf { data: Vec<u8>, pos: usize },
    Stream { reader: Box<dyn Read>, remaining: u64 },
}

impl Source {
    // Fills `buf` with the next chunk; true once the payload is spent.
    fn next_chunk(&mut self, buf: &mut [u8]) -> Result<(usize, bool)> {
        match self {
            Source::Buf { data, pos } => {
                let want = BLOCK_SIZE.min(data.len() - *pos);
                buf[..want].copy_from_slice(&data[*pos..*pos + want]);
                *pos += want;
                Ok((want, *pos == data.len()))
            }
            Source::Stream { reader, remaining } => {
                let want = (*remaining).min(BLOCK_SIZE as u64) as usize;
                reader
                    .read_exact(&mut buf[..want])
                    .context("file payload ended before its declared size")?;
                *remaining -= want as u64;
                Ok((want, *remaining == 0))
            }
        }
    }
}

enum Job {
    ExtendedHeader { payload_len: u64 },
    FileHeader { path: String, stat: FileStat },
    DirHeader { path: String, stat: FileStat },
    Body(Source),
    End,
}

/// Streams whole entries as a lazy sequence of tar blocks
///
/// Operations enqueue work; [`ArchiveWriter::next_block`] drains it one
/// 512-byte block at a time, so arbitrarily large payloads never sit in
/// memory. Entries whose paths exceed 255 bytes are automatically
/// preceded by a PAX extended header carrying the full path.
pub struct ArchiveWriter {
    gen:      Generator,
    queue:    VecDeque<Job>,
    finished: bool,
}

impl ArchiveWriter {
    /// Creates an empty writer
    pub fn new() -> ArchiveWriter {
        ArchiveWriter {
            gen:      Generator::new(),
            queue:    VecDeque::new(),
            finished: false,
        }
    }

    /// Queues a file entry
    ///
    /// For [`FileContent::Bytes`] and [`FileContent::Text`] the entry
    /// size is the payload length; for [`FileContent::Stream`] it is
    /// `stat.size`.
    pub fn add_file(&mut self, path: &str, stat: &FileStat, content: FileContent) -> Result<()> {
        self.ensure_open()?;
        let (size, source) = match content {
            FileContent::Bytes(data) => {
                let size = data.len() as u64;
                (size, Source::Buf { data, pos: 0 })
            }
            FileContent::Text(text) => {
                let data = text.into_bytes();
                let size = data.len() as u64;
                (size, Source::Buf { data, pos: 0 })
            }
            FileContent::Stream(reader) => (
                stat.size,
                Source::Stream {
                    reader,
                    remaining: stat.size,
                },
            ),
        };
        debug!("queueing file {:?} ({} bytes)", path, size);
        let header_path = self.queue_path(path);
        let stat = FileStat {
            size,
            ..stat.clone()
        };
        self.queue.push_back(Job::FileHeader {
            path: header_path,
            stat,
        });
        if size > 0 {
            self.queue.push_back(Job::Body(source));
        }
        Ok(())
    }

    /// Queues a directory entry
    pub fn add_dir(&mut self, path: &str, stat: &FileStat) -> Result<()> {
        self.ensure_open()?;
        let stored = if path.ends_with('/') {
            path.to_owned()
        } else {
            format!("{}/", path)
        };
        debug!("queueing directory {:?}", stored);
        let header_path = self.queue_path(&stored);
        self.queue.push_back(Job::DirHeader {
            path: header_path,
            stat: FileStat {
                size: 0,
                ..stat.clone()
            },
        });
        Ok(())
    }

    /// Queues the two terminator blocks; no further entries may follow
    pub fn finish(&mut self) -> Result<()> {
        self.ensure_open()?;
        debug!("finalizing archive");
        self.queue.push_back(Job::End);
        self.queue.push_back(Job::End);
        self.finished = true;
        Ok(())
    }

    /// Produces the next block, or `None` once the queue is drained
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        let job = match self.queue.front_mut() {
            Some(job) => job,
            None => return Ok(None),
        };
        let (block, done) = match job {
            Job::ExtendedHeader { payload_len } => (self.gen.extended(*payload_len)?, true),
            Job::FileHeader { path, stat } => (self.gen.file(path, stat)?, true),
            Job::DirHeader { path, stat } => (self.gen.directory(path, stat)?, true),
            Job::Body(source) => {
                let mut chunk = [0u8; BLOCK_SIZE];
                let (len, done) = source.next_chunk(&mut chunk)?;
                (self.gen.data(&chunk[..len])?, done)
            }
            Job::End => (self.gen.end()?, true),
        };
        if done {
            self.queue.pop_front();
        }
        Ok(Some(block))
    }

    /// True when no queued work remains (the archive may still be open)
    pub fn is_settled(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drains all queued blocks into `out`, returning the bytes written
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let mut written = 0u64;
        while let Some(block) = self.next_block()? {
            out.write_all(&block)?;
            written += BLOCK_SIZE as u64;
        }
        out.flush()?;
        Ok(written)
    }

    // Long paths travel in a PAX extended header queued ahead of the
    // entry, whose own header then carries an empty path.
    fn queue_path(&mut self, path: &str) -> String {
        if path.len() <= MAX_PATH {
            return path.to_owned();
        }
        let payload = pax::encode_record("path", path);
        self.queue.push_back(Job::ExtendedHeader {
            payload_len: payload.len() as u64,
        });
        self.queue.push_back(Job::Body(Source::Buf {
            data: payload,
            pos:  0,
        }));
        String::new()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            return Err(TarError::InvalidState("archive already finalized".to_string()).into());
        }
        Ok(())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        ArchiveWriter::new()
    }
}
