#[macro_use]
extern crate clap;

use clap::Arg;
use easm::{binary, data, parser, preprocess, Options};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use util::messages::print_and_check;
use util::MessageList;

#[derive(Debug)]
enum Error {
    Assemble,
    Io(std::io::Error, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Assemble => write!(f, "assembly failed"),
            Error::Io(err, path) => write!(f, "file \"{}\": {}", path.display(), err),
        }
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input assembly file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .help("Enables debug output"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Sets the binary output file"),
        )
        .arg(
            Arg::with_name("post_process")
                .short("p")
                .takes_value(true)
                .value_name("FILE")
                .help("Writes the post-processed assembly to FILE"),
        )
        .arg(
            Arg::with_name("reconstruction")
                .short("r")
                .takes_value(true)
                .value_name("FILE")
                .help("Writes the reconstructed assembly to FILE"),
        )
        .arg(
            Arg::with_name("lib")
                .short("l")
                .takes_value(true)
                .value_name("DIR")
                .default_value("lib")
                .help("Sets the %include library path"),
        )
        .arg(
            Arg::with_name("no_pre_process")
                .long("no-pre-process")
                .help("Skips the pre-processing stage"),
        )
        .arg(
            Arg::with_name("no_compile")
                .long("no-compile")
                .help("Skips binary emission"),
        )
        .get_matches();

    let options = Options {
        debug: matches.is_present("debug"),
        lib_path: PathBuf::from(matches.value_of("lib").unwrap()),
        do_pre_process: !matches.is_present("no_pre_process"),
        do_compile: !matches.is_present("no_compile"),
    };

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("output");

    if options.do_compile && output.is_none() {
        eprintln!("Expected output file to be provided (-o <file>)");
        std::process::exit(1);
    }

    let result = run(
        input,
        output,
        matches.value_of("post_process"),
        matches.value_of("reconstruction"),
        &options,
    );

    if let Err(err) = result {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run(
    input: &str,
    output: Option<&str>,
    post_process: Option<&str>,
    reconstruction: Option<&str>,
    options: &Options,
) -> Result<(), Error> {
    let mut messages = MessageList::new();
    let mut pre_data = preprocess::PreProcessorData::new();

    let read = easm::read_source_file(Path::new(input), &mut pre_data, &mut messages);
    if read.is_err() || print_and_check(&mut messages) {
        return Err(Error::Assemble);
    }

    if options.do_pre_process {
        if options.debug {
            println!("=== PRE-PROCESSING ===");
        }
        let result = preprocess::pre_process(&mut pre_data, options, &mut messages);
        if result.is_err() || print_and_check(&mut messages) {
            return Err(Error::Assemble);
        }

        if let Some(path) = post_process {
            let path = PathBuf::from(path);
            let file = File::create(&path).map_err(|err| Error::Io(err, path.clone()))?;
            let mut writer = BufWriter::new(file);
            pre_data
                .write_lines(&mut writer)
                .map_err(|err| Error::Io(err, path.clone()))?;
            if options.debug {
                println!("Written post-processed source to {}", path.display());
            }
        }
    }

    if options.debug {
        println!("=== PARSING ===");
    }
    let mut data = data::Data::from_pre_processed(pre_data);
    let parsed = parser::parse(&mut data, options, &mut messages);
    if parsed.is_err() || print_and_check(&mut messages) {
        return Err(Error::Assemble);
    }

    if let Some(path) = reconstruction {
        let path = PathBuf::from(path);
        let file = File::create(&path).map_err(|err| Error::Io(err, path.clone()))?;
        let mut writer = BufWriter::new(file);
        parser::reconstruct_assembly(&data, &mut writer)
            .map_err(|err| Error::Io(err, path.clone()))?;
    }

    if options.do_compile {
        let path = PathBuf::from(output.unwrap());
        let file = File::create(&path).map_err(|err| Error::Io(err, path.clone()))?;
        let mut writer = BufWriter::new(file);
        binary::write_binary(&data, &mut writer).map_err(|err| Error::Io(err, path.clone()))?;
        writer.flush().map_err(|err| Error::Io(err, path))?;

        if options.debug {
            println!("=== COMPILATION ===");
            for chunk in &data.chunks {
                println!("0x{:08x} {}", chunk.offset, chunk);
            }
        }
    }

    Ok(())
}
