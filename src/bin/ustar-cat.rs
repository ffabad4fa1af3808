use std::{
    fs::File,
    io::{self, BufReader},
    process,
};

use clap::{App, Arg};
use ustar_stream::{ArchiveReader, EntryData, EntryHeader, EntrySink};

struct Cat {
    want:  String,
    found: bool,
}

impl EntrySink for Cat {
    fn on_file(&mut self, header: &EntryHeader, data: &mut EntryData) -> anyhow::Result<()> {
        if header.path == self.want {
            self.found = true;
            io::copy(data, &mut io::stdout())?;
        }
        Ok(())
    }
}

fn main() {
    env_logger::init();
    let matches = App::new("ustar-cat")
        .version("0.1.0")
        .about("Prints the contents of one archive member")
        .arg(
            Arg::new("archive")
                .value_name("ARCHIVE")
                .help("The archive to read")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("The member to print")
                .takes_value(true)
                .required(true),
        )
        .get_matches();

    let f = File::open(matches.value_of("archive").unwrap()).unwrap();
    let mut cat = Cat {
        want:  matches.value_of("path").unwrap().to_owned(),
        found: false,
    };
    ArchiveReader::new(BufReader::new(f)).run(&mut cat).unwrap();

    if !cat.found {
        eprintln!("{}: not found in archive", cat.want);
        process::exit(1);
    }
}
