use clap::{Parser, Subcommand};
use imguploader::hosting::Registry;
use imguploader::imaging::RustBackend;
use imguploader::run::RunError;
use imguploader::{config, output, run};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn version_string() -> &'static str {
    let on_tag = env!("IMGUPLOADER_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("IMGUPLOADER_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imguploader")]
#[command(about = "Resumable batch uploader of images, with an HTML gallery")]
#[command(long_about = "\
Resumable batch uploader of images, with an HTML gallery

Every image in the directory is resized, uploaded with a thumbnail to the
configured hosting service, and linked from a generated HTML page. Progress is
kept in .imguploader-progress.jsonl next to the images: re-running after an
interruption or failure only uploads what is missing.

  photos/
  ├── .imguploader-progress.jsonl  # upload ledger (do not edit while running)
  ├── a.jpg                        # uploaded
  ├── b.txt                        # not an image, ignored
  ├── c.png                        # uploaded
  └── listing.html                 # generated gallery (old ones kept as .1, .2…)

Configuration is read from --config, else ~/.imguploader.toml, else
./.imguploader.toml. Run 'imguploader gen-config' for a documented template.")]
#[command(version = version_string())]
struct Cli {
    /// Configuration file (overrides the default lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Image directory
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Upload pending images and regenerate the gallery (default)
    Run,
    /// Show the upload state of every image without contacting the service
    Status,
    /// Print a stock configuration file with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v` when set.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn execute(cli: &Cli) -> Result<(), RunError> {
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let config_path = config::locate_config(cli.config.as_deref(), Path::new("."))?;
            info!(config = %config_path.display(), "using configuration");

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_upload_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = run::run_with_config_file(
                &cli.dir,
                &config_path,
                &Registry::default(),
                &RustBackend::new(),
                Some(tx),
            );
            // The sender is gone once the run returns, so the printer drains and exits.
            let _ = printer.join();
            output::print_run_report(&result?);
        }
        Command::Status => {
            let lines = run::status(&cli.dir)?;
            output::print_status(&lines);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }
    Ok(())
}
