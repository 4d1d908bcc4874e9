mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use hashguard_core::config::{self, AppConfig};
use hashguard_core::signatures::{FileSignatureSource, HttpSignatureSource};
use hashguard_core::{
    ActionReport, ChannelReporter, DirectoryWalker, FileHasher, ProgressReporter, ScanController,
    ScanEvent, SignatureSource, SignatureStore,
};
use progress::CliReporter;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Scan {
            path,
            quarantine,
            delete,
            yes,
            verbose,
        }) => {
            if let Err(err) = run_scan(&config, path, quarantine, delete, yes, verbose) {
                error!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Some(Commands::Update) => {
            let controller = build_controller(&config, Arc::new(cli_reporter(&config, false)));
            let source = signature_source(&config);
            match controller.refresh_signatures(source.as_ref()) {
                Ok(count) => println!("{} signatures loaded from {}", count, source.describe()),
                Err(_) => process::exit(1),
            }
        }
        Some(Commands::Hash { file }) => {
            let fingerprint = FileHasher::new().hash(&file)?;
            println!("{}  {}", fingerprint, file.display());
        }
        Some(Commands::Watch) => run_watch(&config)?,
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
        }
        Some(Commands::SaveConfig { path }) => {
            config::save_configuration(&path, &config)?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

const REPORT_CHANNEL_CAPACITY: usize = 1024;

fn cli_reporter(config: &AppConfig, verbose: bool) -> CliReporter {
    CliReporter::new(config.alerts, config.sound).verbose(verbose)
}

fn build_controller(config: &AppConfig, reporter: Arc<dyn ProgressReporter>) -> ScanController {
    let walker = DirectoryWalker::new()
        .with_ignore_patterns(&config.ignore_patterns)
        .follow_symlinks(config.follow_symlinks);
    ScanController::new(Arc::new(SignatureStore::new()), walker, reporter)
}

fn signature_source(config: &AppConfig) -> Arc<dyn SignatureSource> {
    match &config.signature_file {
        Some(path) => Arc::new(FileSignatureSource::new(path)),
        None => Arc::new(HttpSignatureSource::new(config.signature_url.clone())),
    }
}

fn scan_root(config: &AppConfig, path: Option<PathBuf>) -> Result<PathBuf> {
    path.or_else(|| config.scan_root.as_ref().map(PathBuf::from))
        .ok_or_else(|| anyhow!("No folder given and no scan_root configured"))
}

fn run_scan(
    config: &AppConfig,
    path: Option<PathBuf>,
    quarantine: bool,
    delete: bool,
    yes: bool,
    verbose: bool,
) -> Result<()> {
    let root = scan_root(config, path)?;
    let controller = build_controller(config, Arc::new(cli_reporter(config, verbose)));

    let source = signature_source(config);
    if controller.refresh_signatures(source.as_ref()).is_err() {
        eprintln!(
            "{} Scanning without signatures; nothing can be detected.",
            "Warning:".yellow()
        );
    }

    controller
        .request_scan(&root)
        .with_context(|| format!("Unable to scan {}", root.display()))?;

    match controller.wait() {
        Some(ScanEvent::CompletedWithMatches(_)) => {}
        _ => return Ok(()),
    }

    if quarantine {
        let report = controller.quarantine(&config.quarantine_path())?;
        print_report("Moved", "to quarantine", &report);
    } else if delete {
        let confirmed = yes
            || prompt_confirm(
                "Are you sure you want to delete all infected files?",
                Some(false),
            )?;
        if confirmed {
            let report = controller.delete(true)?;
            print_report("Deleted", "", &report);
        }
    }

    Ok(())
}

fn print_report(verb: &str, suffix: &str, report: &ActionReport) {
    println!("{} {} files {}", verb, report.processed.to_string().green(), suffix);
    for err in &report.errors {
        println!("  {} {}", "✗".red(), err);
    }
}

fn run_watch(config: &AppConfig) -> Result<()> {
    // Timer-driven output goes through a bounded channel so a slow terminal
    // never holds up the scan thread.
    let (channel, messages) = ChannelReporter::bounded(REPORT_CHANNEL_CAPACITY);
    let channel = Arc::new(channel);
    let printer = {
        let reporter = cli_reporter(config, false);
        thread::Builder::new()
            .name("hashguard-report".to_string())
            .spawn(move || {
                for message in messages {
                    message.deliver(&reporter);
                }
            })?
    };

    let controller = build_controller(config, channel.clone());
    let source = signature_source(config);

    let refresh_every = config.auto_update.then(|| config.update_interval());
    let auto_scan = match (&config.scan_root, config.auto_scan) {
        (Some(root), true) => Some((PathBuf::from(root), config.auto_scan_interval())),
        (None, true) => {
            info!("[Auto Scan] Skipped (no folder configured)");
            None
        }
        _ => None,
    };
    let timers = controller.start_background(Arc::clone(&source), refresh_every, auto_scan)?;

    println!("Commands: scan [path], pause, resume, stop, status, update, quarantine, delete, quit");
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let argument = words.next().map(PathBuf::from);

        match command {
            "scan" => match scan_root(config, argument) {
                // Rejections are already reported by the controller.
                Ok(root) => {
                    let _ = controller.request_scan(&root);
                }
                Err(err) => println!("{}", err),
            },
            "pause" => {
                if !controller.pause_scan() {
                    println!("No running scan to pause");
                }
            }
            "resume" => {
                if !controller.resume_scan() {
                    println!("No paused scan to resume");
                }
            }
            "stop" => {
                if !controller.stop_scan() {
                    println!("No scan to stop");
                }
            }
            "status" => print_status(&controller),
            "update" => {
                let _ = controller.refresh_signatures(source.as_ref());
            }
            "quarantine" => match controller.quarantine(&config.quarantine_path()) {
                Ok(report) => print_report("Moved", "to quarantine", &report),
                Err(err) => println!("{}", err),
            },
            "delete" => {
                if prompt_confirm("Are you sure you want to delete all infected files?", Some(false))? {
                    match controller.delete(true) {
                        Ok(report) => print_report("Deleted", "", &report),
                        Err(err) => println!("{}", err),
                    }
                }
            }
            "quit" | "exit" => break,
            other => println!("Unknown command: {}", other),
        }
    }

    controller.stop_scan();
    controller.wait();

    drop(timers);
    drop(controller);
    let dropped = channel.dropped();
    drop(channel);
    if printer.join().is_err() {
        error!("Report printer thread panicked");
    }
    if dropped > 0 {
        debug!("{} progress messages dropped while the terminal was busy", dropped);
    }
    Ok(())
}

fn print_status(controller: &ScanController) {
    let store = controller.signature_store();
    let updated = store
        .last_refresh_time()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!("Scan state: {}", controller.state());
    if let Some(root) = controller.active_root() {
        println!("Scanning: {}", root.display());
    }
    println!("Signatures: {} (updated {})", store.len(), updated);

    let matches = controller.matches();
    println!("Infected files pending action: {}", matches.len());
    for entry in &matches {
        match &entry.last_error {
            Some(err) => println!("  - {} ({})", entry.path().display(), err.red()),
            None => println!("  - {}", entry.path().display()),
        }
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
