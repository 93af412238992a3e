use std::ffi::OsString;

use clap::{value_parser, Arg, ArgAction, Command};

#[rustfmt::skip]
pub fn create_cmd_args() -> Command
{
    Command::new("deckscan-cli")
        .about("Feeds LUMA frames (or synthetic noise) through the deckscan pipeline and prints per-frame reports")
        .arg(Arg::new("input")
            .short('i')
            .long("input")
            .help("LUMA file to read frames from (see deckscan_core::luma_io); repeated to scan several files in sequence")
            .action(ArgAction::Append)
            .value_parser(value_parser!(OsString)))
        .arg(Arg::new("frames")
            .short('n')
            .long("frames")
            .help("Number of synthetic noise frames to generate when no --input is given")
            .value_parser(value_parser!(u32))
            .default_value("5"))
        .arg(Arg::new("width")
            .long("width")
            .help("Width of synthetic frames")
            .value_parser(value_parser!(u16))
            .default_value("1280"))
        .arg(Arg::new("height")
            .long("height")
            .help("Height of synthetic frames")
            .value_parser(value_parser!(u16))
            .default_value("720"))
        .arg(Arg::new("debug")
            .long("debug")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display debug information and higher"))
        .arg(Arg::new("trace")
            .long("trace")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display very verbose information"))
        .arg(Arg::new("warn")
            .long("warn")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display warnings and errors"))
        .arg(Arg::new("info")
            .long("info")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display one line per frame"))
}

#[test]
fn verify_cli()
{
    create_cmd_args().debug_assert();
}
