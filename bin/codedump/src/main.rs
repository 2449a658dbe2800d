use codepatch::bytecode::{decode, render_with, LegacyStackEffects, RenderSettings};
use codepatch::code::debug_info;
use codepatch::decl::{iter_declarations, CodeDeclaration};
use codepatch::marshal::Pyc;

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn main() -> Result<(), codepatch::Error> {
    env_logger::init();

    let matches = Command::new("Bytecode dumper")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Disassemble every code unit in a compiled Python 2.7 module")
        .arg(
            Arg::new("fields")
                .long("fields")
                .action(ArgAction::SetTrue)
                .help("Print the fields of each code unit before its instructions"),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .value_name("INDEX")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Index of the first instruction to print"),
        )
        .arg(
            Arg::new("end")
                .long("end")
                .value_name("INDEX")
                .value_parser(value_parser!(usize))
                .help("Index of the last instruction to print (defaults to the last one)"),
        )
        .arg(
            Arg::new("operand-width")
                .long("operand-width")
                .value_name("CHARS")
                .value_parser(value_parser!(usize))
                .default_value("40")
                .help("Truncate operand text longer than this"),
        )
        .arg(
            Arg::new("no-tags")
                .long("no-tags")
                .action(ArgAction::SetTrue)
                .help("Leave out code unit tags (which change from run to run)"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the input `.pyc` file to use")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .get_matches();

    let input: &PathBuf = match matches.get_one("INPUT") {
        Some(input) => input,
        None => return Ok(()),
    };
    let start = matches.get_one::<usize>("start").copied().unwrap_or(0);
    let end = matches.get_one::<usize>("end").copied();
    let show_fields = matches.get_flag("fields");
    let mut settings = RenderSettings {
        unit_tags: !matches.get_flag("no-tags"),
        ..RenderSettings::default()
    };
    if let Some(width) = matches.get_one::<usize>("operand-width") {
        settings.operand_width = *width;
    }

    log::info!("Reading '{}'", input.display());
    let pyc = Pyc::load_from_path(input)?;
    log::debug!("Magic {:02x?}, modified at {}", pyc.magic, pyc.mtime);

    let root = CodeDeclaration::from_code_unit(pyc.code.clone());
    for declaration in iter_declarations(&root) {
        println!("== {}", declaration.path);
        if show_fields {
            println!("{}", debug_info(&declaration.unit));
        }

        let mut decoder = decode(&declaration.unit, &LegacyStackEffects);
        let instructions: Vec<_> = decoder.by_ref().collect();
        if let Some(malformation) = decoder.malformation() {
            log::warn!(
                "Stopped decoding '{}' early: {:?}",
                declaration.path,
                malformation
            );
        }

        let listing = render_with(&settings, &instructions, start, end);
        if !listing.is_empty() {
            println!("{}", listing);
        }
    }

    Ok(())
}
