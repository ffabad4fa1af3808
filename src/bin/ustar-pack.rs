use std::{fs::File, os::linux::fs::MetadataExt, path::Path};

use clap::{App, Arg};
use ustar_stream::{ArchiveWriter, FileContent, FileStat};
use walkdir::WalkDir;

fn stat_from_meta(meta: &std::fs::Metadata) -> FileStat {
    FileStat {
        size:  meta.len(),
        mode:  meta.st_mode() & 0o7777,
        uid:   meta.st_uid(),
        gid:   meta.st_gid(),
        mtime: meta.st_mtime().max(0) as u64,
        uname: String::new(),
        gname: String::new(),
    }
}

fn main() {
    env_logger::init();
    let matches = App::new("ustar-pack")
        .version("0.1.0")
        .about("Packs directories into a ustar archive")
        .arg(
            Arg::new("output")
                .value_name("OUTPUT")
                .help("The archive to create")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("The directories to pack")
                .takes_value(true)
                .multiple_values(true)
                .required(true),
        )
        .get_matches();

    let mut out = File::create(matches.value_of("output").unwrap()).unwrap();
    let mut writer = ArchiveWriter::new();

    for input in matches.values_of("input").unwrap() {
        let base = Path::new(input);
        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry.unwrap();
            let rel = entry.path().strip_prefix(base).unwrap();
            if rel.as_os_str().is_empty() {
                continue;
            }
            let path = rel.to_str().expect("archive paths must be UTF-8");
            let meta = entry.metadata().unwrap();
            let stat = stat_from_meta(&meta);
            if entry.file_type().is_dir() {
                writer.add_dir(path, &stat).unwrap();
            } else if entry.file_type().is_file() {
                let file = File::open(entry.path()).unwrap();
                writer
                    .add_file(path, &stat, FileContent::Stream(Box::new(file)))
                    .unwrap();
            }
            // Drain as we go so only one block is in flight at a time.
            writer.write_to(&mut out).unwrap();
        }
    }

    writer.finish().unwrap();
    writer.write_to(&mut out).unwrap();
}
