use std::{fs::File, io::BufReader};

use clap::{App, Arg};
use ustar_stream::{ArchiveReader, EntryData, EntryHeader, EntrySink};

struct Lister;

impl EntrySink for Lister {
    fn on_file(&mut self, header: &EntryHeader, _data: &mut EntryData) -> anyhow::Result<()> {
        println!("{:>12} {}", header.size, header.path);
        Ok(())
    }

    fn on_directory(&mut self, header: &EntryHeader) -> anyhow::Result<()> {
        println!("{:>12} {}", "-", header.path);
        Ok(())
    }
}

fn main() {
    env_logger::init();
    let matches = App::new("ustar-list")
        .version("0.1.0")
        .about("Lists the entries of a ustar archive")
        .arg(
            Arg::new("archive")
                .value_name("ARCHIVE")
                .help("The archive to list")
                .takes_value(true)
                .required(true),
        )
        .get_matches();

    let f = File::open(matches.value_of("archive").unwrap()).unwrap();
    ArchiveReader::new(BufReader::new(f))
        .run(&mut Lister)
        .unwrap();
}
