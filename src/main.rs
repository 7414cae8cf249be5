use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod model;
mod ui;
mod domain;
mod controller;
mod inputter;
mod store;
mod view;
mod importer;
mod exporter;

use controller::Controller;
use domain::{TdmConfig, TdmError};
use model::{Model, Status};
use ui::UI;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to load on startup
    file: Option<PathBuf>,

    /// Rows shown per page
    #[arg(long, default_value_t = store::DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Key event poll interval in ms
    #[arg(long, default_value_t = 250)]
    event_poll_time: u64,

    /// Directory exports are written to
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// How long status messages stay visible, in ms
    #[arg(long, default_value_t = 5000)]
    status_timeout: u64,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(args.log_file.as_deref()) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    match run(args) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

/// With a log file everything down to info lands there, keeping the
/// terminal free for the ui. Without one only errors go to stderr.
/// RUST_LOG overrides either default.
fn init_tracing(log_file: Option<&Path>) -> Result<(), TdmError> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    match log_file {
        Some(path) => {
            let file = std::fs::File::options().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(filter("info"))
                .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
                .with(ErrorLayer::default())
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter("error"))
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(ErrorLayer::default())
                .init();
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<(), TdmError> {
    info!("Starting tdm!");

    let config = TdmConfig::default()
        .event_poll_time(args.event_poll_time)
        .page_size(args.page_size)
        .export_dir(args.export_dir)
        .status_timeout(args.status_timeout);

    let file = match &args.file {
        Some(file) => Some(PathBuf::from(
            shellexpand::full(&file.to_string_lossy())?.as_ref(),
        )),
        None => None,
    };

    let ui = UI::new();
    let controller = Controller::new(&config);
    let mut model = Model::init(config, file.as_deref())?;

    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events, map them to a Message and apply it
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
