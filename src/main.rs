use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;

use photolapse::caption::find_system_font;
use photolapse::config::{self, MovieConfig};
use photolapse::sequence::RateSource;
use photolapse::{list_images, FfmpegEncoder, FfmpegMuxer, FfprobeAudio, SequenceDriver};

fn cli() -> Command {
    Command::new("photolapse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn a folder of dated photos into a captioned time-lapse movie")
        .arg(
            Arg::new("source-dir")
                .short('s')
                .long("source-dir")
                .value_name("DIR")
                .help("Directory containing the original images")
                .default_value("."),
        )
        .arg(
            Arg::new("tmp-dir")
                .short('t')
                .long("tmp-dir")
                .value_name("DIR")
                .help("Directory for the numbered frames")
                .default_value("tmp"),
        )
        .arg(
            Arg::new("fps")
                .short('r')
                .long("fps")
                .value_name("RATE")
                .help("Frames per second (ignored when --audio is given)")
                .default_value("2"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output movie file")
                .default_value("movie.mkv"),
        )
        .arg(
            Arg::new("max-width")
                .long("max-width")
                .value_name("PIXELS")
                .help("Largest allowed frame width")
                .default_value("1920"),
        )
        .arg(
            Arg::new("max-height")
                .long("max-height")
                .value_name("PIXELS")
                .help("Largest allowed frame height")
                .default_value("1080"),
        )
        .arg(
            Arg::new("audio")
                .short('a')
                .long("audio")
                .value_name("FILE")
                .help("Soundtrack; the frame rate is stretched to its length and the track is muxed in"),
        )
        .arg(
            Arg::new("skip-frames")
                .long("skip-frames")
                .help("Reuse frames already present in the frame directory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quality")
                .short('q')
                .long("quality")
                .value_name("CRF")
                .help("Video quality (CRF: 0-51, lower = better quality)")
                .default_value("20"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("NUM")
                .help("Number of threads used to compose frames (default: auto-detect)")
                .default_value("0"),
        )
        .arg(
            Arg::new("font")
                .long("font")
                .value_name("TTF")
                .help("Font for the date caption (default: first common system font found)"),
        )
        .arg(
            Arg::new("background")
                .long("background")
                .value_name("RRGGBB")
                .help("Letterbox color")
                .default_value("000000"),
        )
        .arg(
            Arg::new("full-time-model")
                .long("full-time-model")
                .value_name("MODEL")
                .help("Camera model whose timestamps keep the time of day (repeatable)")
                .action(ArgAction::Append),
        )
}

fn parse_number<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T, Box<dyn Error>> {
    let raw = matches
        .get_one::<String>(name)
        .ok_or_else(|| format!("missing value for --{name}"))?;
    raw.parse::<T>()
        .map_err(|_| format!("Invalid {name} value: {raw}").into())
}

fn path_arg(matches: &ArgMatches, name: &str) -> Option<PathBuf> {
    matches.get_one::<String>(name).map(PathBuf::from)
}

fn config_from_matches(matches: &ArgMatches) -> Result<MovieConfig, Box<dyn Error>> {
    let defaults = MovieConfig::default();

    let font = match path_arg(matches, "font") {
        Some(font) => Some(font),
        None => {
            let found = find_system_font();
            if found.is_none() {
                println!(
                    "{}: no system font found, frames will have no date caption (use --font)",
                    "Warning".yellow()
                );
            }
            found
        }
    };

    let full_time_models = matches
        .get_many::<String>("full-time-model")
        .map(|models| models.cloned().collect())
        .unwrap_or(defaults.full_time_models);

    let background = matches
        .get_one::<String>("background")
        .map(|hex| config::parse_background(hex))
        .transpose()?
        .unwrap_or(defaults.background);

    Ok(MovieConfig {
        source_dir: path_arg(matches, "source-dir").unwrap_or(defaults.source_dir),
        frame_dir: path_arg(matches, "tmp-dir").unwrap_or(defaults.frame_dir),
        fps: parse_number(matches, "fps")?,
        output: path_arg(matches, "output").unwrap_or(defaults.output),
        max_width: parse_number(matches, "max-width")?,
        max_height: parse_number(matches, "max-height")?,
        audio: path_arg(matches, "audio"),
        skip_composition: matches.get_flag("skip-frames"),
        quality: parse_number(matches, "quality")?,
        threads: parse_number(matches, "threads")?,
        font,
        background,
        full_time_models,
    })
}

fn print_settings(config: &MovieConfig) {
    println!("{}", "Building time-lapse with settings:".bold().cyan());
    println!("  {}: {}", "Source".green(), config.source_dir.display());
    println!("  {}: {}", "Frames".green(), config.frame_dir.display());
    println!(
        "  {}: {}x{}",
        "Max size".green(),
        config.max_width,
        config.max_height
    );
    match &config.font {
        Some(font) => println!("  {}: {}", "Caption font".green(), font.display()),
        None => println!("  {}: off", "Caption".green()),
    }
    if config.threads > 0 {
        println!("  {}: {} (manual)", "Threads".green(), config.threads);
    } else {
        println!(
            "  {}: auto-detect ({} available)",
            "Threads".green(),
            rayon::current_num_threads()
        );
    }
    match &config.audio {
        Some(audio) => println!(
            "  {}: {} (frame rate follows the track)",
            "Audio".yellow(),
            audio.display()
        ),
        None => println!("  {}: {} fps", "Rate".yellow(), config.fps),
    }
    println!(
        "  {}: {} (CRF {})",
        "Output".yellow(),
        config.output.display(),
        config.quality
    );
    if config.skip_composition {
        println!("  {}: reusing existing frames", "Compose".yellow());
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = cli().get_matches();
    let config = config_from_matches(&matches)?;
    config.validate()?;

    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
    }

    print_settings(&config);
    let start_time = Instant::now();

    let encoder = FfmpegEncoder::new();
    let muxer = FfmpegMuxer::new();
    let probe = FfprobeAudio::new();
    let driver = SequenceDriver::new(&config, &encoder, &muxer, &probe).with_progress(Box::new(
        |done, total| {
            print!("\r{} frame {}/{}", "Composing".yellow(), done, total);
            if done == total {
                println!();
            }
            let _ = std::io::stdout().flush();
        },
    ));

    let paths = list_images(&config.source_dir)?;
    let report = driver.run(&paths)?;

    for skipped in &report.skipped {
        println!(
            "{}: {} ({})",
            "Skipped".yellow(),
            skipped.path.display(),
            skipped.reason
        );
    }
    for failed in &report.failed {
        println!(
            "{}: {} ({})",
            "Dropped".yellow(),
            failed.path.display(),
            failed.reason
        );
    }
    println!("{} {} images found", "Found".bold().blue(), report.found);
    println!("{}: {}", "Canvas".green(), report.canvas);
    if config.skip_composition {
        println!("{} {} existing frames", "Reused".bold().blue(), report.frames);
    }

    let encoded = &report.encode;
    if encoded.rate.source == RateSource::Audio {
        println!(
            "{}: {} fps derived from the audio track",
            "Rate".blue(),
            encoded.rate.fps
        );
    }
    println!(
        "{}: {}",
        "Video created successfully".bold().green(),
        encoded.video.display()
    );
    if let Some(muxed) = &encoded.muxed {
        println!("{}: {}", "Soundtrack added".bold().green(), muxed.display());
    }
    println!(
        "{}: {:.2} seconds at {} fps",
        "Video duration".blue(),
        report.frames as f64 / encoded.rate.fps,
        encoded.rate.fps
    );
    println!("{}: {:.2?}", "Processing time".blue(), start_time.elapsed());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}
