#![allow(dead_code)]

use std::{env, fs, io::Cursor, io::Read, path::PathBuf};

use ustar_stream::{ArchiveReader, EntryData, EntryHeader, EntrySink};

/// Loads a pre-built archive from tests/data
pub fn fixture(name: &str) -> Vec<u8> {
    let root = env::var("CARGO_MANIFEST_DIR").expect("$CARGO_MANIFEST_DIR");
    let mut path = PathBuf::from(root);
    path.push("tests/data");
    path.push(name);
    fs::read(path).expect("fixture should exist")
}

/// One entry as dispatched by the reader; files carry their contents
pub struct Recorded {
    pub header: EntryHeader,
    pub data:   Option<Vec<u8>>,
}

/// Records every dispatched entry for later assertions
#[derive(Default)]
pub struct Recorder {
    pub entries: Vec<Recorded>,
    pub ended:   bool,
}

impl EntrySink for Recorder {
    fn on_file(&mut self, header: &EntryHeader, data: &mut EntryData) -> anyhow::Result<()> {
        let mut buf = Vec::new();
        data.read_to_end(&mut buf)?;
        self.entries.push(Recorded {
            header: header.clone(),
            data:   Some(buf),
        });
        Ok(())
    }

    fn on_directory(&mut self, header: &EntryHeader) -> anyhow::Result<()> {
        self.entries.push(Recorded {
            header: header.clone(),
            data:   None,
        });
        Ok(())
    }

    fn on_end(&mut self) -> anyhow::Result<()> {
        self.ended = true;
        Ok(())
    }
}

/// Parses a whole archive into recorded entries
pub fn parse_all(bytes: &[u8]) -> Recorder {
    let mut rec = Recorder::default();
    ArchiveReader::new(Cursor::new(bytes))
        .run(&mut rec)
        .expect("archive should parse");
    rec
}

/// Unsigned header sum with the checksum field read as spaces
pub fn checksum(block: &[u8]) -> u32 {
    block
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if (148..156).contains(&i) {
                b' ' as u32
            } else {
                *b as u32
            }
        })
        .sum()
}

/// Rewrites the checksum field after a block has been edited
pub fn rewrite_checksum(block: &mut [u8]) {
    let sum = checksum(block);
    let encoded = format!("{:06o}\0 ", sum);
    block[148..156].copy_from_slice(encoded.as_bytes());
}

/// Reads a NUL- or space-terminated octal field
pub fn parse_octal(field: &[u8]) -> u64 {
    let end = field
        .iter()
        .position(|b| *b == 0 || *b == b' ')
        .unwrap_or(field.len());
    let digits = std::str::from_utf8(&field[..end]).expect("octal field should be ASCII");
    u64::from_str_radix(digits, 8).expect("octal field should parse")
}
