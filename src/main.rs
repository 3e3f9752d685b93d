//! tvcap collects channel logo snapshots from a capture card, a batch per visit,
//! until every channel in the list has reached its quota.

pub mod module;

use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::module::channel;
use crate::module::drive::{self, DriveOptions};
use crate::module::error::{Result, TvcapError};
use crate::module::tuner::v4l2::V4l2Tuner;
use crate::module::util::init::resource::init;
use crate::module::vision::classifier::onnx::LogoClassifier;

/// Capture channel logo snapshots into BASEDIR.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Dataset directory, must exist
    basedir: PathBuf,

    /// Snapshots per channel
    limit: Option<u32>,

    /// Snapshots per channel visit
    batch: Option<u32>,

    /// Configuration file [default: BASEDIR/tvcap.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// The main function of tvcap
pub fn main() {
    let args = Args::parse();
    if !args.basedir.is_dir() {
        eprintln!("{} is not a directory\n", args.basedir.display());
        let _ = Args::command().print_help();
        return;
    }

    if let Err(e) = start(args) {
        if e.is_interrupt() {
            log::warn!("Interrupted, captured snapshots are kept");
        } else {
            log::error!("{}", e);
        }
        eprintln!("tvcap: {}", e);
        std::process::exit(1);
    }
}

/// Prepare the collaborators and run the capture loop.
fn start(args: Args) -> Result<()> {
    let property = init(&args.basedir, args.config.as_deref())?;
    init_log(&property.path.log_file(), &property.conf.system.log_level)?;
    log::info!("Starting tvcap in {}", property.path.dir.base.display());

    let channels = channel::load(&property.path.file.channels)?;

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = interrupt.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    let mut tuner = V4l2Tuner::new(&property.conf, channels.clone(), interrupt);
    let mut store = match drive::prepare(&mut tuner, &property.path, &channels)? {
        Some(store) => store,
        None => {
            println!("Power control not online");
            return Ok(());
        }
    };

    let model = &property.conf.model;
    let mut classifier = LogoClassifier::new(
        &property.path.model_file(&model.file),
        &property.path.model_file(&model.labels),
        property.conf.crop.width,
        property.conf.crop.height,
        model.intra_threads,
    )?;

    let mut options = DriveOptions::from_conf(&property.conf);
    if let Some(limit) = args.limit {
        options.limit = limit;
    }
    if let Some(batch) = args.batch {
        options.batch = batch;
    }

    drive::run(
        &mut tuner,
        &mut classifier,
        &channels,
        &mut store,
        &property.path,
        &options,
        &mut rand::thread_rng(),
    )?;
    Ok(())
}

/// This function initializes the logger system using the log4rs crate.
///
/// # Arguments
/// * `file` - Path of the log file, its directory must exist
/// * `level` - Root level name such as `INFO` or `DEBUG`
///
/// # Log Example
/// ```
/// log::debug!("Debug Message");
/// log::info!("Info Message");
/// log::warn!("Warning Message");
/// log::error!("Error Message");
/// ```
fn init_log(file: &Path, level: &str) -> Result<()> {
    use log::LevelFilter;
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::append::file::FileAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let level: LevelFilter = level
        .parse()
        .map_err(|_| TvcapError::Logger(format!("unknown log level {}", level)))?;

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} - {l}: {m}{n}")))
        .build(file)?;
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{h({d(%H:%M:%S)} {l}: {m}{n})}")))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(
            Root::builder()
                .appender("logfile")
                .appender("console")
                .build(level),
        )
        .map_err(|e| TvcapError::Logger(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| TvcapError::Logger(e.to_string()))?;
    Ok(())
}
