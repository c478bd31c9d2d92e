use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;

use libquads_calib::config::NoiseScanConfig;
use libquads_calib::error::NoiseScanError;
use libquads_calib::mask::generate_mask;
use libquads_calib::noise_scan::{NoiseScan, ScanReport};
use libquads_calib::scan_status::ScanStatus;
use libquads_calib::session::{OfflineSession, SequencerSession};

const DEFAULT_MASK_PATH: &str = "mask_edge.h";

fn make_mask(path: &Path) -> bool {
    let mask = generate_mask();
    println!("{}", mask.len());
    match mask.write_json(path) {
        Ok(()) => {
            log::info!("Wrote mask to {}", path.to_string_lossy());
            true
        }
        Err(e) => {
            log::error!("{e}");
            false
        }
    }
}

fn make_template_config(path: &Path) -> bool {
    log::info!("Making a template config at {}...", path.to_string_lossy());
    match NoiseScanConfig::default().write_config_file(path) {
        Ok(()) => {
            log::info!("Done.");
            true
        }
        Err(e) => {
            log::error!("{e}");
            false
        }
    }
}

/// Run the scan against an offline session, releasing the session at the end
fn run_offline_scan(
    base: NoiseScanConfig,
    tx: mpsc::Sender<ScanStatus>,
    show_journal: bool,
) -> Result<ScanReport, NoiseScanError> {
    let mut session = OfflineSession::new("NoiseScanClient");
    let config = NoiseScanConfig::from_session(&mut session, base)?;
    let report = NoiseScan::new(&config).run(&mut session, Some(&tx));
    if show_journal {
        for (path, value) in session.journal() {
            log::info!("ODB {path} = {value}");
        }
    }
    session.close()?;
    report
}

fn summarize(report: &ScanReport, config: &NoiseScanConfig) {
    log::info!(
        "Scan finished after {} iterations; {} chip results, {} missing",
        report.iterations,
        report.results.len(),
        report.missing.len()
    );
    for threshold in config.thresholds() {
        let (count, noisy, unmaskable) = report
            .for_threshold(threshold)
            .fold((0u64, 0u64, 0u64), |(c, n, u), r| {
                (c + 1, n + r.tot_noisy, u + r.unmaskable)
            });
        if count > 0 {
            log::info!(
                "Threshold {threshold}: mean noisy={:.1}, mean unmaskable={:.1}",
                noisy as f64 / count as f64,
                unmaskable as f64 / count as f64
            );
        }
    }
}

fn noise_scan(config_path: &Path, show_journal: bool, pb_manager: &MultiProgress) -> bool {
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match NoiseScanConfig::read_config_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return false;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!(
        "Start threshold: {} Stop threshold: {} Step: {}",
        config.start_threshold,
        config.stop_threshold,
        config.step_threshold
    );
    log::info!("Chips: {:?}", config.chips);
    log::info!("Iterations per threshold: {}", config.max_iterations);

    let pb = pb_manager.add(ProgressBar::new(100));
    let (tx, rx) = mpsc::channel::<ScanStatus>();
    let sent_config = config.clone();
    let handle = std::thread::spawn(move || run_offline_scan(sent_config, tx, show_journal));

    // The channel closes when the scan drops its sender
    for status in rx.iter() {
        pb.set_position((status.progress * 100.0) as u64);
        pb.set_message(format!(
            "threshold {} iteration {}",
            status.threshold, status.iteration
        ));
    }
    pb.finish();

    match handle.join() {
        Ok(Ok(report)) => {
            summarize(&report, &config);
            true
        }
        Ok(Err(e)) => {
            log::error!("Noise scan failed with error: {e}");
            false
        }
        Err(_) => {
            log::error!("Failed to join noise scan task!");
            false
        }
    }
}

fn main() -> ExitCode {
    // Create a cli
    let path_arg = Arg::new("path")
        .short('p')
        .long("path")
        .required(true)
        .help("Path to the configuration file");
    let matches = Command::new("quads_calib")
        .about("Calibration utilities for the Quads pixel readout")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("mask")
                .about("Generate the edge pixel mask as a JSON array")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .default_value(DEFAULT_MASK_PATH)
                        .help("Path of the mask file to write"),
                ),
        )
        .subcommand(
            Command::new("new")
                .about("Make a template noise scan configuration yaml file")
                .arg(path_arg.clone()),
        )
        .subcommand(
            Command::new("noise-scan")
                .about("Run the threshold noise scan against an offline session")
                .arg(path_arg)
                .arg(
                    Arg::new("journal")
                        .long("journal")
                        .action(clap::ArgAction::SetTrue)
                        .help("Log every ODB write the scan made"),
                ),
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

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return ExitCode::FAILURE;
    }

    let success = match matches.subcommand() {
        Some(("mask", sub)) => {
            let output = sub
                .get_one::<String>("output")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MASK_PATH));
            make_mask(&output)
        }
        Some(("new", sub)) => match sub.get_one::<String>("path") {
            Some(path) => make_template_config(&PathBuf::from(path)),
            None => false,
        },
        Some(("noise-scan", sub)) => match sub.get_one::<String>("path") {
            Some(path) => noise_scan(&PathBuf::from(path), sub.get_flag("journal"), &pb_manager),
            None => false,
        },
        _ => false,
    };

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
