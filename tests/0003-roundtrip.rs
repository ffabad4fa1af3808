use std::{
    fs::File,
    io::{Cursor, Write},
};

use pretty_assertions::assert_eq;
use ustar_stream::{pax, ArchiveReader, ArchiveWriter, EntryKind, FileContent, FileStat};

mod common;
use common::{parse_all, Recorder};

fn emit(writer: &mut ArchiveWriter) -> Vec<u8> {
    writer.finish().unwrap();
    let mut bytes = Vec::new();
    writer.write_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn three_entries_roundtrip() {
    let stat = FileStat {
        mode: 0o644,
        ..Default::default()
    };
    let mut writer = ArchiveWriter::new();
    writer
        .add_file("x", &stat, FileContent::Bytes(b"testing".to_vec()))
        .unwrap();
    writer
        .add_file("y", &stat, FileContent::Text("testing".to_string()))
        .unwrap();
    writer.add_dir("z", &stat).unwrap();
    let bytes = emit(&mut writer);

    let rec = parse_all(&bytes);
    assert!(rec.ended);
    assert_eq!(rec.entries.len(), 3);
    assert_eq!(rec.entries[0].header.path, "x");
    assert_eq!(rec.entries[0].header.size, 7);
    assert_eq!(rec.entries[0].data.as_deref(), Some(&b"testing"[..]));
    assert_eq!(rec.entries[1].header.path, "y");
    assert_eq!(rec.entries[1].data.as_deref(), Some(&b"testing"[..]));
    assert_eq!(rec.entries[2].header.path, "z/");
    assert_eq!(rec.entries[2].header.kind, EntryKind::Directory);
    assert!(rec.entries[2].data.is_none());
}

#[test]
fn single_directory_archive() {
    let mut writer = ArchiveWriter::new();
    writer
        .add_dir(
            "d",
            &FileStat {
                mode: 0o755,
                ..Default::default()
            },
        )
        .unwrap();
    let bytes = emit(&mut writer);

    assert_eq!(bytes.len(), 3 * 512);
    assert_eq!(&bytes[..3], b"d/\0");
    assert_eq!(bytes[156], b'5');
    assert_eq!(&bytes[124..136], b"00000000000\0");
    assert!(bytes[512..].iter().all(|b| *b == 0));

    let rec = parse_all(&bytes);
    assert_eq!(rec.entries.len(), 1);
    assert_eq!(rec.entries[0].header.path, "d/");
}

#[test]
fn long_path_travels_in_an_extended_header() {
    let path = "p".repeat(300);
    let mut writer = ArchiveWriter::new();
    writer
        .add_file(&path, &FileStat::default(), FileContent::Bytes(b"hi".to_vec()))
        .unwrap();
    let bytes = emit(&mut writer);

    // The archive leads with the PAX header and its payload.
    assert_eq!(bytes[156], b'x');
    assert!(bytes[512..].starts_with(b"310 path="));
    // The entry's own header then carries an empty name.
    assert!(bytes[1024..1124].iter().all(|b| *b == 0));

    let rec = parse_all(&bytes);
    assert_eq!(rec.entries.len(), 1);
    assert_eq!(rec.entries[0].header.path, path);
    assert_eq!(rec.entries[0].header.size, 2);
    assert_eq!(rec.entries[0].data.as_deref(), Some(&b"hi"[..]));
}

#[test]
fn long_directory_path_keeps_its_slash() {
    let path = "d".repeat(255);
    let mut writer = ArchiveWriter::new();
    writer.add_dir(&path, &FileStat::default()).unwrap();
    let bytes = emit(&mut writer);

    // 255 bytes plus the appended slash no longer fit the header fields.
    assert_eq!(bytes[156], b'x');
    let rec = parse_all(&bytes);
    assert_eq!(rec.entries.len(), 1);
    assert_eq!(rec.entries[0].header.path, format!("{}/", path));
    assert_eq!(rec.entries[0].header.kind, EntryKind::Directory);
}

#[test]
fn boundary_path_lengths_roundtrip() {
    for len in [1usize, 99, 100, 101, 155, 156, 255, 256, 300] {
        let path = "a".repeat(len);
        let mut writer = ArchiveWriter::new();
        writer
            .add_file(&path, &FileStat::default(), FileContent::Bytes(vec![b'#'; 9]))
            .unwrap();
        let bytes = emit(&mut writer);
        let rec = parse_all(&bytes);
        assert_eq!(rec.entries.len(), 1, "path length {}", len);
        assert_eq!(rec.entries[0].header.path, path, "path length {}", len);
        assert_eq!(rec.entries[0].data.as_deref(), Some(&[b'#'; 9][..]));
    }
}

#[test]
fn stats_roundtrip() {
    let stat = FileStat {
        size:  0,
        mode:  0o751,
        uid:   1234,
        gid:   4321,
        mtime: 1650000000,
        uname: "build".to_string(),
        gname: "wheel".to_string(),
    };
    let mut writer = ArchiveWriter::new();
    writer
        .add_file("f", &stat, FileContent::Bytes(b"abc".to_vec()))
        .unwrap();
    writer.add_dir("d", &stat).unwrap();
    let bytes = emit(&mut writer);

    let rec = parse_all(&bytes);
    let f = &rec.entries[0].header;
    assert_eq!(f.size, 3);
    assert_eq!(f.mode, 0o751);
    assert_eq!(f.uid, 1234);
    assert_eq!(f.gid, 4321);
    assert_eq!(f.mtime, 1650000000);
    assert_eq!(f.uname, "build");
    assert_eq!(f.gname, "wheel");
    let d = &rec.entries[1].header;
    assert_eq!(d.size, 0);
    assert_eq!(d.uname, "build");
}

#[test]
fn payload_sizes_roundtrip_exactly() {
    for size in [0usize, 1, 511, 512, 513, 1024, 1025, 5000] {
        let contents: Vec<u8> = (0..size).map(|i| (i % 251) as u8 + 1).collect();
        let mut writer = ArchiveWriter::new();
        writer
            .add_file("f", &FileStat::default(), FileContent::Bytes(contents.clone()))
            .unwrap();
        let bytes = emit(&mut writer);

        // Block alignment, plus exactly two null blocks at the tail.
        assert_eq!(bytes.len() % 512, 0, "size {}", size);
        let expected_blocks = 1 + size.div_ceil(512) + 2;
        assert_eq!(bytes.len(), expected_blocks * 512, "size {}", size);
        let tail = &bytes[bytes.len() - 1024..];
        assert!(tail.iter().all(|b| *b == 0), "size {}", size);
        if size > 0 {
            let last_data = &bytes[bytes.len() - 1536..bytes.len() - 1024];
            assert!(last_data.iter().any(|b| *b != 0), "size {}", size);
        }

        let rec = parse_all(&bytes);
        assert_eq!(rec.entries[0].header.size, size as u64);
        assert_eq!(rec.entries[0].data.as_deref(), Some(contents.as_slice()));
    }
}

#[test]
fn streamed_content_roundtrips_through_a_file() {
    let contents: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("payload");
    File::create(&src_path)
        .unwrap()
        .write_all(&contents)
        .unwrap();

    let stat = FileStat {
        size: 1000,
        ..Default::default()
    };
    let mut writer = ArchiveWriter::new();
    let src = File::open(&src_path).unwrap();
    writer
        .add_file("payload", &stat, FileContent::Stream(Box::new(src)))
        .unwrap();
    let bytes = emit(&mut writer);

    let archive_path = dir.path().join("out.tar");
    File::create(&archive_path).unwrap().write_all(&bytes).unwrap();

    let mut rec = Recorder::default();
    ArchiveReader::new(File::open(&archive_path).unwrap())
        .run(&mut rec)
        .unwrap();
    assert_eq!(rec.entries[0].data.as_deref(), Some(contents.as_slice()));
}

#[test]
fn short_stream_is_an_error() {
    let stat = FileStat {
        size: 100,
        ..Default::default()
    };
    let mut writer = ArchiveWriter::new();
    writer
        .add_file(
            "f",
            &stat,
            FileContent::Stream(Box::new(Cursor::new(vec![0u8; 50]))),
        )
        .unwrap();
    writer.finish().unwrap();
    let mut bytes = Vec::new();
    assert!(writer.write_to(&mut bytes).is_err());
}

#[test]
fn writer_rejects_entries_after_finish() {
    let mut writer = ArchiveWriter::new();
    writer.finish().unwrap();
    assert!(writer
        .add_file("f", &FileStat::default(), FileContent::Bytes(vec![1]))
        .is_err());
    assert!(writer.add_dir("d", &FileStat::default()).is_err());
    assert!(writer.finish().is_err());
}

#[test]
fn writer_settles_once_drained() {
    let mut writer = ArchiveWriter::new();
    assert!(writer.is_settled());
    writer
        .add_file("f", &FileStat::default(), FileContent::Bytes(vec![1, 2, 3]))
        .unwrap();
    assert!(!writer.is_settled());
    let mut sink = Vec::new();
    writer.write_to(&mut sink).unwrap();
    assert!(writer.is_settled());
    // Not yet finalized: more entries may still be queued.
    writer.add_dir("d", &FileStat::default()).unwrap();
    writer.finish().unwrap();
    writer.write_to(&mut sink).unwrap();
    let rec = parse_all(&sink);
    assert_eq!(rec.entries.len(), 2);
}

#[test]
fn empty_archive_is_two_null_blocks() {
    let mut writer = ArchiveWriter::new();
    let bytes = emit(&mut writer);
    assert_eq!(bytes.len(), 1024);
    assert!(bytes.iter().all(|b| *b == 0));
    let rec = parse_all(&bytes);
    assert!(rec.ended);
    assert!(rec.entries.is_empty());
}

#[test]
fn pax_record_sizes_are_self_consistent() {
    for value_len in (1..130).chain(980..1030) {
        let record = pax::encode_record("path", &"v".repeat(value_len));
        let space = record.iter().position(|b| *b == b' ').unwrap();
        let declared: usize = std::str::from_utf8(&record[..space])
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(declared, record.len(), "value length {}", value_len);
        assert_eq!(record.last(), Some(&b'\n'));
    }
}
