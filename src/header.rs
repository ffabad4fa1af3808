use std::str;

use crate::{error::TarError, Block, BLOCK_SIZE};

// Field offsets within a header block, per POSIX.1-1988.
const NAME_OFF: usize = 0;
const MODE_OFF: usize = 100;
const UID_OFF: usize = 108;
const GID_OFF: usize = 116;
const SIZE_OFF: usize = 124;
const MTIME_OFF: usize = 136;
const CHKSUM_OFF: usize = 148;
const TYPEFLAG_OFF: usize = 156;
const MAGIC_OFF: usize = 257;
const VERSION_OFF: usize = 263;
const UNAME_OFF: usize = 265;
const GNAME_OFF: usize = 297;
const PREFIX_OFF: usize = 345;

const NAME_LEN: usize = 100;
const MODE_LEN: usize = 8;
const ID_LEN: usize = 8;
const SIZE_LEN: usize = 12;
const MTIME_LEN: usize = 12;
const CHKSUM_LEN: usize = 8;
const OWNER_LEN: usize = 32;
const PREFIX_LEN: usize = 155;

const MAGIC: &[u8; 6] = b"ustar\0";
const VERSION: &[u8; 2] = b"00";

/// Largest value an 11-digit octal field can hold (2^33 - 1)
pub(crate) const MAX_SIZE: u64 = 0o77777777777;
/// Largest value a 7-digit octal field can hold (2^21 - 1)
pub(crate) const MAX_ID: u64 = 0o7777777;
/// Longest path storable without a PAX extended header
pub(crate) const MAX_PATH: usize = NAME_LEN + PREFIX_LEN;

/// Advisory name written into PAX extended headers
pub(crate) const PAX_HEADER_NAME: &str = "./PaxHeader";

/// The kind of entry a header block describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file
    File,
    /// A directory
    Directory,
    /// A PAX extended header modifying the next entry
    Extended,
}

impl EntryKind {
    fn from_typeflag(flag: u8) -> Result<EntryKind, TarError> {
        match flag {
            0 | b'0' => Ok(EntryKind::File),
            b'5' => Ok(EntryKind::Directory),
            b'x' => Ok(EntryKind::Extended),
            other => Err(TarError::InvalidHeader(format!(
                "unknown typeflag {:?}",
                other as char
            ))),
        }
    }

    fn typeflag(self) -> u8 {
        match self {
            EntryKind::File => b'0',
            EntryKind::Directory => b'5',
            EntryKind::Extended => b'x',
        }
    }
}

/// Metadata attached to a generated entry
///
/// Omitted fields keep their zero defaults, matching what tar readers
/// expect for unknown ownership and epoch timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStat {
    /// Entry size in bytes
    pub size:  u64,
    /// Permission bits
    pub mode:  u32,
    /// Owner user ID
    pub uid:   u32,
    /// Owner group ID
    pub gid:   u32,
    /// Modification time, seconds since the epoch
    pub mtime: u64,
    /// Owner user name
    pub uname: String,
    /// Owner group name
    pub gname: String,
}

/// A parsed header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// The kind of entry this header introduces
    pub kind:  EntryKind,
    /// Entry path, joined from the prefix and name fields
    pub path:  String,
    /// Payload size in bytes
    pub size:  u64,
    /// Permission bits
    pub mode:  u32,
    /// Owner user ID
    pub uid:   u32,
    /// Owner group ID
    pub gid:   u32,
    /// Modification time, seconds since the epoch
    pub mtime: u64,
    /// Owner user name
    pub uname: String,
    /// Owner group name
    pub gname: String,
}

/// Encodes one header block for an entry
pub(crate) fn encode(path: &str, stat: &FileStat, kind: EntryKind) -> Result<Block, TarError> {
    if stat.size > MAX_SIZE {
        return Err(TarError::InvalidStat(format!(
            "size {} exceeds the 11-digit octal field",
            stat.size
        )));
    }
    if stat.mtime > MAX_SIZE {
        return Err(TarError::InvalidStat(format!(
            "mtime {} exceeds the 11-digit octal field",
            stat.mtime
        )));
    }
    if u64::from(stat.uid) > MAX_ID {
        return Err(TarError::InvalidStat(format!(
            "uid {} exceeds the 7-digit octal field",
            stat.uid
        )));
    }
    if u64::from(stat.gid) > MAX_ID {
        return Err(TarError::InvalidStat(format!(
            "gid {} exceeds the 7-digit octal field",
            stat.gid
        )));
    }
    if stat.uname.len() > OWNER_LEN {
        return Err(TarError::InvalidStat(format!(
            "uname {:?} exceeds {} bytes",
            stat.uname, OWNER_LEN
        )));
    }
    if stat.gname.len() > OWNER_LEN {
        return Err(TarError::InvalidStat(format!(
            "gname {:?} exceeds {} bytes",
            stat.gname, OWNER_LEN
        )));
    }

    let (name, prefix) = split_path(path)?;

    let mut block: Block = [0; BLOCK_SIZE];
    block[NAME_OFF..NAME_OFF + name.len()].copy_from_slice(name);
    block[PREFIX_OFF..PREFIX_OFF + prefix.len()].copy_from_slice(prefix);
    write_octal(&mut block[MODE_OFF..MODE_OFF + MODE_LEN], u64::from(stat.mode & 0o7777));
    write_octal(&mut block[UID_OFF..UID_OFF + ID_LEN], u64::from(stat.uid));
    write_octal(&mut block[GID_OFF..GID_OFF + ID_LEN], u64::from(stat.gid));
    write_octal(&mut block[SIZE_OFF..SIZE_OFF + SIZE_LEN], stat.size);
    write_octal(&mut block[MTIME_OFF..MTIME_OFF + MTIME_LEN], stat.mtime);
    block[TYPEFLAG_OFF] = kind.typeflag();
    block[MAGIC_OFF..MAGIC_OFF + MAGIC.len()].copy_from_slice(MAGIC);
    block[VERSION_OFF..VERSION_OFF + VERSION.len()].copy_from_slice(VERSION);
    block[UNAME_OFF..UNAME_OFF + stat.uname.len()].copy_from_slice(stat.uname.as_bytes());
    block[GNAME_OFF..GNAME_OFF + stat.gname.len()].copy_from_slice(stat.gname.as_bytes());

    let sum = checksum(&block);
    write_checksum(&mut block[CHKSUM_OFF..CHKSUM_OFF + CHKSUM_LEN], sum);

    Ok(block)
}

/// Decodes and validates one header block
pub(crate) fn decode(block: &[u8]) -> Result<EntryHeader, TarError> {
    let stored = read_octal(&block[CHKSUM_OFF..CHKSUM_OFF + CHKSUM_LEN])?;
    let computed = u64::from(checksum(block));
    if stored != computed {
        return Err(TarError::InvalidHeader(format!(
            "checksum mismatch (stored {}, computed {})",
            stored, computed
        )));
    }
    if &block[MAGIC_OFF..MAGIC_OFF + MAGIC.len()] != MAGIC {
        return Err(TarError::InvalidHeader("bad ustar magic".to_string()));
    }
    if &block[VERSION_OFF..VERSION_OFF + VERSION.len()] != VERSION {
        return Err(TarError::InvalidHeader("bad ustar version".to_string()));
    }
    let kind = EntryKind::from_typeflag(block[TYPEFLAG_OFF])?;

    let name = trim_nul(&block[NAME_OFF..NAME_OFF + NAME_LEN]);
    let prefix = trim_nul(&block[PREFIX_OFF..PREFIX_OFF + PREFIX_LEN]);
    let mut path = Vec::with_capacity(prefix.len() + name.len());
    path.extend_from_slice(prefix);
    path.extend_from_slice(name);
    let path = String::from_utf8(path)
        .map_err(|_| TarError::InvalidHeader("path is not UTF-8".to_string()))?;

    Ok(EntryHeader {
        kind,
        path,
        size: read_octal(&block[SIZE_OFF..SIZE_OFF + SIZE_LEN])?,
        mode: read_octal(&block[MODE_OFF..MODE_OFF + MODE_LEN])? as u32,
        uid: read_octal(&block[UID_OFF..UID_OFF + ID_LEN])? as u32,
        gid: read_octal(&block[GID_OFF..GID_OFF + ID_LEN])? as u32,
        mtime: read_octal(&block[MTIME_OFF..MTIME_OFF + MTIME_LEN])?,
        uname: read_string(&block[UNAME_OFF..UNAME_OFF + OWNER_LEN], "uname")?,
        gname: read_string(&block[GNAME_OFF..GNAME_OFF + OWNER_LEN], "gname")?,
    })
}

/// Unsigned sum of the block with the checksum field read as spaces
pub(crate) fn checksum(block: &[u8]) -> u32 {
    block
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if (CHKSUM_OFF..CHKSUM_OFF + CHKSUM_LEN).contains(&i) {
                u32::from(b' ')
            } else {
                u32::from(*b)
            }
        })
        .sum()
}

/// Splits a path into its (name, prefix) halves
///
/// Paths over 100 bytes keep their trailing 100 bytes in the name field
/// and push the leading remainder into the prefix field.
fn split_path(path: &str) -> Result<(&[u8], &[u8]), TarError> {
    let bytes = path.as_bytes();
    if bytes.len() <= NAME_LEN {
        Ok((bytes, &[]))
    } else if bytes.len() <= MAX_PATH {
        let cut = bytes.len() - NAME_LEN;
        Ok((&bytes[cut..], &bytes[..cut]))
    } else {
        Err(TarError::InvalidFileName(format!(
            "path of {} bytes does not fit the name and prefix fields",
            bytes.len()
        )))
    }
}

// Right-justified octal digits, '0'-filled, with a trailing NUL.
fn write_octal(field: &mut [u8], value: u64) {
    let digits = field.len() - 1;
    let encoded = format!("{:0>width$o}", value, width = digits);
    field[..digits].copy_from_slice(encoded.as_bytes());
    field[digits] = 0;
}

// The checksum field alone carries six digits and a "\0 " suffix.
fn write_checksum(field: &mut [u8], sum: u32) {
    let encoded = format!("{:06o}\0 ", sum);
    field.copy_from_slice(encoded.as_bytes());
}

/// Reads an octal field, tolerating NUL or space termination
pub(crate) fn read_octal(field: &[u8]) -> Result<u64, TarError> {
    let digits = str::from_utf8(trim_nul(field))
        .map_err(|_| TarError::InvalidHeader("numeric field is not ASCII".to_string()))?
        .trim_matches(' ');
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 8)
        .map_err(|_| TarError::InvalidHeader(format!("malformed octal field {:?}", digits)))
}

fn read_string(field: &[u8], what: &str) -> Result<String, TarError> {
    str::from_utf8(trim_nul(field))
        .map(str::to_owned)
        .map_err(|_| TarError::InvalidHeader(format!("{} is not UTF-8", what)))
}

fn trim_nul(field: &[u8]) -> &[u8] {
    match field.iter().position(|b| *b == 0) {
        Some(end) => &field[..end],
        None => field,
    }
}
