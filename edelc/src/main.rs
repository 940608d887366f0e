#[macro_use]
extern crate clap;

use clap::Arg;
use edelc::{compile_to_assembly, Config};
use std::fs;
use std::path::PathBuf;
use util::messages::print_and_check;
use util::Level;

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input source file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .help("Enables debug output"),
        )
        .arg(
            Arg::with_name("ast")
                .long("ast")
                .help("Dumps the parsed AST to stdout"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Sets the assembly output file"),
        )
        .arg(
            Arg::with_name("function_placeholder")
                .long("function-placeholder")
                .help("Emits stub bodies for declared-but-undefined functions"),
        )
        .arg(
            Arg::with_name("no_function_placeholder")
                .long("no-function-placeholder")
                .help("Requires declared functions to be defined"),
        )
        .arg(
            Arg::with_name("indentation")
                .long("indentation")
                .help("Indents emitted instructions"),
        )
        .arg(
            Arg::with_name("no_indentation")
                .long("no-indentation")
                .help("Disables instruction indentation"),
        )
        .arg(
            Arg::with_name("always_define_symbols")
                .long("always-define-symbols")
                .help("Defines every symbol even when unused"),
        )
        .arg(Arg::with_name("lint").long("lint").help("Enables linting"))
        .arg(
            Arg::with_name("no_lint")
                .long("no-lint")
                .help("Disables linting"),
        )
        .arg(
            Arg::with_name("lint_level")
                .long("lint-level")
                .takes_value(true)
                .value_name("N")
                .help("Sets the minimum reported lint level"),
        )
        .get_matches();

    let mut config = Config::default();
    config.debug = matches.is_present("debug");
    config.print_ast = matches.is_present("ast");
    if matches.is_present("function_placeholder") {
        config.function_placeholder = true;
    }
    if matches.is_present("no_function_placeholder") {
        config.function_placeholder = false;
    }
    if matches.is_present("indentation") {
        config.indent_asm = true;
    }
    if matches.is_present("no_indentation") {
        config.indent_asm = false;
    }
    config.always_define_symbols = matches.is_present("always_define_symbols");
    if matches.is_present("lint") {
        config.lint = true;
    }
    if matches.is_present("no_lint") {
        config.lint = false;
    }
    if let Some(level) = matches.value_of("lint_level") {
        config.lint_level = Level::from_int(level.parse().unwrap_or(1));
    }

    let input = matches.value_of("INPUT").unwrap();
    let source = match fs::read_to_string(input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read {}: {}", input, err);
            std::process::exit(1);
        }
    };

    let (assembly, mut messages) = compile_to_assembly(input, &source, config);
    let had_error = print_and_check(&mut messages);

    let assembly = match (assembly, had_error) {
        (Some(assembly), false) => assembly,
        _ => std::process::exit(1),
    };

    let output = matches
        .value_of("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(input).with_extension("asm"));

    if let Err(err) = fs::write(&output, assembly) {
        eprintln!("failed to write {}: {}", output.display(), err);
        std::process::exit(1);
    }
}
