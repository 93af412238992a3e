//! CLI demo harness for the deckscan pipeline (§6.5): drives a
//! [`ScanManager`] across either recorded LUMA frames or synthetic noise and
//! prints the resulting status and, when one is produced, report for each.
//!
//! This binary exists to exercise the pipeline end to end outside of the
//! (out-of-scope) host application; it is not itself part of the
//! specification.
use std::ffi::OsString;

use clap::ArgMatches;
use deckscan::ScanManager;
use deckscan_core::luma_io;
use deckscan_core::ImageBuffer;
use deckscan_iface::{CodeDefinition, ConfigStore, PausableClock, SystemPausableClock};
use log::{error, info, Level};

mod cmd_args;
mod demo_format;
mod synthetic;

fn setup_logger(options: &ArgMatches)
{
    let log_level = if *options.get_one::<bool>("debug").unwrap()
    {
        Level::Debug
    }
    else if *options.get_one::<bool>("trace").unwrap()
    {
        Level::Trace
    }
    else if *options.get_one::<bool>("warn").unwrap()
    {
        Level::Warn
    }
    else if *options.get_one::<bool>("info").unwrap()
    {
        Level::Info
    }
    else
    {
        Level::Error
    };

    simple_logger::init_with_level(log_level).unwrap();
    info!("logging initialized at {log_level}");
}

fn load_frame(path: &OsString) -> Result<ImageBuffer<'static, u8>, Box<dyn std::error::Error>>
{
    let bytes = std::fs::read(path)?;
    let parsed = luma_io::read_luma(&bytes)?;
    let mut image: ImageBuffer<'static, u8> = ImageBuffer::owned(parsed.width as usize, parsed.height as usize);
    for y in 0..parsed.height as usize
    {
        for x in 0..parsed.width as usize
        {
            image.set(x, y, parsed.samples[y * parsed.width as usize + x]);
        }
    }
    Ok(image)
}

fn run(options: &ArgMatches) -> Result<(), Box<dyn std::error::Error>>
{
    let definition = demo_format::build();
    let mut config = ConfigStore::with_defaults();
    let clock = SystemPausableClock::new();
    let mut manager = ScanManager::new();

    let inputs: Vec<&OsString> = options.get_many::<OsString>("input").map(Iterator::collect).unwrap_or_default();

    if inputs.is_empty()
    {
        let frames = *options.get_one::<u32>("frames").unwrap();
        let width = *options.get_one::<u16>("width").unwrap() as usize;
        let height = *options.get_one::<u16>("height").unwrap() as usize;
        info!("no --input given, scanning {frames} synthetic {width}x{height} frame(s)");
        for index in 0..frames
        {
            let image = synthetic::noise_frame(width, height, u64::from(index));
            report_frame(&mut manager, &image, &definition, &mut config, &clock);
        }
    }
    else
    {
        for path in inputs
        {
            info!("scanning {}", path.to_string_lossy());
            let image = load_frame(path)?;
            report_frame(&mut manager, &image, &definition, &mut config, &clock);
        }
    }

    Ok(())
}

fn report_frame(
    manager: &mut ScanManager,
    image: &ImageBuffer<'_, u8>,
    definition: &dyn CodeDefinition,
    config: &mut ConfigStore,
    clock: &dyn PausableClock
)
{
    let result = manager.scan(image, definition, config, clock);
    info!(
        "frame {}: status={}",
        result.metadata.frame_count,
        result.metadata.status_code.as_str()
    );
    if let Some(report) = result.report
    {
        info!(
            "  report #{}: {} cards, confidence={:.1}, high_confidence={}",
            report.report_count,
            report.indices.len(),
            report.confidence_factor,
            report.high_confidence
        );
    }
}

fn main()
{
    let cmd = cmd_args::create_cmd_args();
    let options = cmd.get_matches();

    setup_logger(&options);

    if let Err(err) = run(&options)
    {
        error!("could not complete scan: {err}");
        std::process::exit(1);
    }
}
