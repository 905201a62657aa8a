use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use liblumilog::config::Config;
use liblumilog::process::run;
use liblumilog::worker_status::{Stage, WorkerStatus};

fn make_template_config(path: &Path) -> Result<(), String> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(|e| e.to_string())?;
    let mut file = File::create(path).map_err(|e| e.to_string())?;
    file.write_all(yaml_str.as_bytes())
        .map_err(|e| e.to_string())
}

/// The library logs through spdlog; send all of it to a file
fn init_file_logger() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./lumilog.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .level_filter(spdlog::LevelFilter::All)
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn make_bar(pb_manager: &MultiProgress, prefix: String) -> ProgressBar {
    let style = ProgressStyle::with_template("{prefix:>12} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let bar = pb_manager.add(ProgressBar::new(100));
    bar.set_style(style);
    bar.set_prefix(prefix);
    bar
}

fn main() {
    // Create a cli
    let matches = Command::new("lumilog_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if LogWrapper::new(pb_manager.clone(), logger).try_init().is_err() {
        eprintln!("Could not create logging/progress!");
        return;
    }
    if let Err(e) = init_file_logger() {
        log::warn!("Could not create log file, detailed logging disabled: {e}");
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            log::error!("A configuration path is required (-p/--path)");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Failed to write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Reference date: {}", config.reference_date);
    log::info!("Collision start: {}", config.physics.collision_start);
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    for channel in config.channels.iter() {
        log::info!(
            "Channel {} ({:?}): {}",
            channel.name,
            channel.role,
            channel.path.to_string_lossy()
        );
    }
    log::info!("Number of threads: {}", config.n_threads);

    // Spawn the task!
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let handle = std::thread::spawn(move || run(config, tx));

    // One bar per loading worker, plus one for writing
    let mut loading_bars: Vec<Option<ProgressBar>> = Vec::new();
    let mut writing_bar: Option<ProgressBar> = None;
    loop {
        let status = match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(s) => s,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break, // The task dropped its sender
        };
        let bar = match status.stage {
            Stage::Loading => {
                if loading_bars.len() <= status.worker_id {
                    loading_bars.resize(status.worker_id + 1, None);
                }
                loading_bars[status.worker_id].get_or_insert_with(|| {
                    make_bar(&pb_manager, format!("worker {}", status.worker_id))
                })
            }
            Stage::Writing => {
                writing_bar.get_or_insert_with(|| make_bar(&pb_manager, String::from("writing")))
            }
        };
        bar.set_message(status.channel.clone());
        bar.set_position((status.progress * 100.0) as u64);
    }

    for bar in loading_bars.iter().flatten().chain(writing_bar.iter()) {
        bar.finish();
    }

    match handle.join() {
        Ok(result) => match result {
            Ok(outcome) => {
                for skipped in outcome.skipped.iter() {
                    log::warn!("Skipped: {skipped}");
                }
                log::info!(
                    "Successfully wrote {} series! Check lumilog.log for details.",
                    outcome.series.len()
                );
            }
            Err(e) => log::error!("Processing failed with error: {e}"),
        },
        Err(_) => log::error!("Failed to join processing task!"),
    }

    log::info!("Done.");
}
