//! Monitor camera orientation drift in the terminal.

use clap::*;
use driftscope::prelude::v1::{Result, *};
use log::*;
use std::fs::File;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod plot;

/// How often the screen is redrawn.
const REDRAW_PERIOD: Duration = Duration::from_millis(100);

/// One exported history row.
#[derive(serde::Serialize)]
struct Row {
    frame: u64,
    angle: Option<f32>,
    direction_x: Option<f32>,
    direction_y: Option<f32>,
    direction_angle: Option<f32>,
}

impl From<&Sample> for Row {
    fn from(s: &Sample) -> Self {
        Self {
            frame: s.frame,
            angle: s.angle,
            direction_x: s.direction.map(|d| d.vector.x),
            direction_y: s.direction.map(|d| d.vector.y),
            direction_angle: s.direction.map(|d| d.angle),
        }
    }
}

fn load_config(matches: &ArgMatches) -> Result<(String, PipelineConfig)> {
    let (title, mut config) = if let Some(path) = matches.value_of("config") {
        let file = File::open(path)?;
        let config = serde_json::from_reader(file)
            .map_err(|e| anyhow!("failed to parse config {}: {}", path, e))?;
        (path.to_string(), config)
    } else {
        let preset: Preset = matches.value_of("preset").unwrap_or("line-segments").parse()?;
        (preset.to_string(), preset.config())
    };

    for assignment in matches.values_of("set").into_iter().flatten() {
        config.apply_override(assignment)?;
    }

    config.validate()?;

    Ok((title, config))
}

/// Watch stdin for a line containing `q`.
///
/// The thread is left detached, it is blocked on stdin until the process exits.
fn spawn_quit_watcher() -> Arc<AtomicBool> {
    let quit = Arc::new(AtomicBool::new(false));
    let flag = quit.clone();

    std::thread::spawn(move || {
        let quit_requested = std::io::stdin()
            .lock()
            .lines()
            .map_while(|line| line.ok())
            .any(|line| line.trim() == "q");

        // A closed stdin is not a request to quit.
        if quit_requested {
            flag.store(true, Ordering::Relaxed);
        }
    });

    quit
}

fn export_csv(path: &str, history: &AngleHistory) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for sample in history.iter() {
        writer.serialize(Row::from(sample))?;
    }
    writer.flush()?;
    info!("Exported {} samples to {}", history.len(), path);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("driftscope-monitor")
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .takes_value(true)
                .required_unless_present("list")
                .help("image directory, video file, or cam:N"),
        )
        .arg(
            Arg::new("preset")
                .long("preset")
                .short('p')
                .takes_value(true)
                .possible_values(Preset::ALL.map(Preset::name))
                .conflicts_with("config"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .takes_value(true)
                .help("JSON pipeline configuration"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .short('s')
                .takes_value(true)
                .multiple_occurrences(true)
                .help("override a parameter, as name=value"),
        )
        .arg(
            Arg::new("period")
                .long("period")
                .takes_value(true)
                .default_value("100")
                .help("milliseconds between frames"),
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .takes_value(true)
                .help("stop after this many frame reads"),
        )
        .arg(
            Arg::new("history")
                .long("history")
                .takes_value(true)
                .default_value("100"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .takes_value(true)
                .help("export the history here on exit"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("do not draw the plot"),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .help("print the parameters of the configuration and exit"),
        )
        .get_matches();

    let (title, mut config) = load_config(&matches)?;

    if matches.is_present("list") {
        serde_json::to_writer_pretty(std::io::stdout(), &config)?;
        println!();
        for (name, prop) in config.props() {
            println!("{} = {}", name, prop);
        }
        return Ok(());
    }

    let input = matches
        .value_of("input")
        .ok_or_else(|| anyhow!("no input given"))?;
    let period: u64 = matches.value_of("period").unwrap_or("100").parse()?;
    let max_ticks = matches
        .value_of("ticks")
        .map(str::parse::<u64>)
        .transpose()?;
    let history_len: usize = matches.value_of("history").unwrap_or("100").parse()?;
    let quiet = matches.is_present("quiet");

    let source = frame_loader::create_source(input)?;

    if let Some(fps) = source.get_framerate() {
        info!("Source runs at {:.1} fps", fps);
    }

    let mut worker = EstimationWorker::new(
        config,
        source,
        Schedule {
            period: Duration::from_millis(period),
            max_ticks,
        },
    )?;

    let rx = worker.subscribe(history_len.max(16));
    let quit = spawn_quit_watcher();
    let mut history = AngleHistory::new(history_len);

    worker.start()?;

    let size = plot::screen_size();
    let mut stdout = std::io::stdout();

    loop {
        let running = worker.is_running();

        let added = history.drain(&rx);
        for sample in history.iter().skip(history.len().saturating_sub(added)) {
            if let Some(angle) = sample.angle {
                info!("Deviation angle: {:.2} degrees", angle);
            }
        }

        if !quiet {
            // Clear the screen and move to the top left corner.
            write!(stdout, "\x1B[2J\x1B[H{}", plot::render(&history, &title, size))?;
            stdout.flush()?;
        }

        if quit.load(Ordering::Relaxed) || !running {
            break;
        }

        std::thread::sleep(REDRAW_PERIOD);
    }

    let report = worker.stop();
    history.drain(&rx);

    info!(
        "Done: {} ticks, {} frames, {} skipped",
        report.ticks, report.frames, report.skipped
    );

    if let Some(path) = matches.value_of("csv") {
        export_csv(path, &history)?;
    }

    Ok(())
}
