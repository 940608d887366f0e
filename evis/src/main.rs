#[macro_use]
extern crate clap;

use clap::Arg;
use evis::sources::{Breakpoints, Sources};
use std::fs;
use std::path::PathBuf;

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("BASE")
                .help("Base path; missing inputs derive from <base>.asm/.edel/.s/<base>")
                .index(1),
        )
        .arg(
            Arg::with_name("asm")
                .long("asm")
                .takes_value(true)
                .value_name("FILE")
                .help("Sets the assembly source file"),
        )
        .arg(
            Arg::with_name("bin")
                .long("bin")
                .takes_value(true)
                .value_name("FILE")
                .help("Sets the binary image file"),
        )
        .arg(
            Arg::with_name("edel")
                .long("edel")
                .takes_value(true)
                .value_name("FILE")
                .help("Sets the high-level source file"),
        )
        .arg(
            Arg::with_name("reconstruction")
                .long("reconstruction")
                .takes_value(true)
                .value_name("FILE")
                .help("Sets the reconstructed assembly file"),
        )
        .arg(
            Arg::with_name("stdout")
                .long("stdout")
                .takes_value(true)
                .value_name("FILE")
                .help("Redirects the emulator's standard output"),
        )
        .arg(
            Arg::with_name("stdin")
                .long("stdin")
                .takes_value(true)
                .value_name("FILE")
                .help("Feeds the emulator's standard input"),
        )
        .arg(
            Arg::with_name("breakpoint")
                .short("b")
                .long("breakpoint")
                .takes_value(true)
                .value_name("N,M,...")
                .help("Sets initial $pc breakpoints"),
        )
        .get_matches();

    let base = matches.value_of("BASE");
    let derive = |flag: Option<&str>, extension: &str| -> Option<PathBuf> {
        match flag {
            Some(path) => Some(PathBuf::from(path)),
            None => base.map(|base| {
                if extension.is_empty() {
                    PathBuf::from(base)
                } else {
                    PathBuf::from(format!("{}.{}", base, extension))
                }
            }),
        }
    };

    let asm_path = derive(matches.value_of("asm"), "asm");
    let bin_path = derive(matches.value_of("bin"), "");
    let edel_path = derive(matches.value_of("edel"), "edel");
    let s_path = derive(matches.value_of("reconstruction"), "s");

    let (asm_path, s_path) = match (asm_path, s_path) {
        (Some(asm), Some(s)) => (asm, s),
        _ => {
            eprintln!("expected --asm and --reconstruction (or a positional base)");
            std::process::exit(1);
        }
    };

    let mut sources = Sources::new();

    match fs::read_to_string(&s_path) {
        Ok(content) => sources.load_reconstruction(&s_path, &content),
        Err(err) => {
            eprintln!("failed to read {}: {}", s_path.display(), err);
            std::process::exit(1);
        }
    }
    match fs::read_to_string(&asm_path) {
        Ok(content) => sources.load_assembly(&asm_path, &content),
        Err(err) => {
            eprintln!("failed to read {}: {}", asm_path.display(), err);
            std::process::exit(1);
        }
    }
    if let Some(edel_path) = &edel_path {
        if let Ok(content) = fs::read_to_string(edel_path) {
            sources.load_language(edel_path, &content);
        }
    }

    let mut breakpoints = Breakpoints::new();
    if let Some(list) = matches.value_of("breakpoint") {
        for part in list.split(',') {
            match part.trim().parse::<u64>() {
                Ok(pc) => breakpoints.set(pc, true),
                Err(_) => {
                    eprintln!("-b: invalid breakpoint '{}'", part);
                    std::process::exit(1);
                }
            }
        }
    }

    println!(
        "traced {} program locations across {} files",
        sources.pc_to_line.len(),
        sources.files.len()
    );
    if let Some(bin_path) = &bin_path {
        if let Ok(image) = fs::read(bin_path) {
            if image.len() >= eisa::constants::HEADER_BYTES as usize {
                use byteorder::ByteOrder;
                let entry = util::Endian::read_u64(&image[0..8]);
                let interrupt = util::Endian::read_u64(&image[8..16]);
                println!(
                    "binary image: {} bytes, entry 0x{:x}, interrupt handler 0x{:x}",
                    image.len(),
                    entry,
                    interrupt
                );
            }
        }
    }
    if !breakpoints.is_empty() {
        println!("{} breakpoint(s) armed", breakpoints.len());
    }
    for pc in sources.pc_to_line.keys().take(5) {
        println!("{}", evis::processor::describe_position(&sources, *pc));
    }
}
