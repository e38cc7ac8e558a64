//! Project Watcher entry point.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use project_watcher::Project;
use project_watcher_cli::config::{resolve_project_path, WatchSettings};
use project_watcher_cli::inspect;
use project_watcher_cli::watch::{self, CameraArg, WatchOptions};

#[derive(Parser)]
#[command(
    name = "project-watcher",
    about = "Watch cameras, keep the frames that changed, and remember stable scenes",
    version
)]
struct Cli {
    /// Project directory (default: $PROJECT_WATCHER_DIR, then the current directory).
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Settings file (default: project-watcher.toml in the project directory).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay image folders as cameras until Ctrl-C or every camera has stopped.
    Watch {
        /// Camera to watch, as NAME=FOLDER. Repeat for several cameras.
        #[arg(long = "camera", value_name = "NAME=FOLDER", required = true)]
        cameras: Vec<CameraArg>,

        /// Frames per second read from each folder.
        #[arg(long, default_value_t = 2.0)]
        fps: f64,

        /// Start over at the first image instead of stopping at the last.
        #[arg(long = "loop")]
        looping: bool,
    },

    /// List cameras in the project (default).
    Cameras {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a camera's saved frames, newest first.
    History {
        camera: String,

        /// Show at most this many entries.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Fraction of a saved frame that changed relative to another.
    Diff {
        camera: String,
        /// Saved frame measured.
        a: String,
        /// Saved frame used as the reference.
        b: String,
    },

    /// Write the difference of an image against the camera's last save.
    Preview {
        camera: String,
        image: PathBuf,

        /// Output image path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   project-watcher completions bash > ~/.local/share/bash-completion/completions/project-watcher
    ///   project-watcher completions zsh > ~/.zfunc/_project-watcher
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let project_dir = cli.project.clone();
    let config_path = cli.config.clone();
    let open = move || -> anyhow::Result<(Project, WatchSettings)> {
        let root = resolve_project_path(project_dir.as_deref());
        let settings = WatchSettings::load(config_path.as_deref(), &root)?;
        let project = Project::open(&root)
            .with_context(|| format!("Cannot open project {}", root.display()))?
            .with_jpeg_quality(settings.capture.jpeg_quality);
        Ok((project, settings))
    };

    match cli.command.unwrap_or(Commands::Cameras { json: false }) {
        Commands::Watch {
            cameras,
            fps,
            looping,
        } => {
            let (project, settings) = open()?;
            let stop = Arc::new(AtomicBool::new(false));
            let s = stop.clone();
            ctrlc::set_handler(move || {
                s.store(true, Ordering::SeqCst);
            })
            .context("Error setting Ctrl-C handler")?;

            let options = WatchOptions {
                cameras,
                fps,
                looping,
            };
            let summary = watch::run(&project, &settings, &options, stop)?;
            println!(
                "Saved {} frames, found {} stable images, {} failed saves",
                summary.saved, summary.stable, summary.save_failures
            );
        }

        Commands::Cameras { json } => {
            let (project, _) = open()?;
            let cameras = inspect::list_cameras(&project)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cameras)?);
            } else if cameras.is_empty() {
                println!("No cameras in {}", project.root().display());
            } else {
                for camera in &cameras {
                    println!(
                        "{:<20} {:>6} saved {:>4} stable  {}",
                        camera.name, camera.entries, camera.stable, camera.moniker
                    );
                }
            }
        }

        Commands::History { camera, limit } => {
            let (project, _) = open()?;
            for line in inspect::history(&project, &camera, limit)? {
                if line.stable {
                    println!("{}  stable", line.filename);
                } else {
                    println!("{}", line.filename);
                }
            }
        }

        Commands::Diff { camera, a, b } => {
            let (project, settings) = open()?;
            let config = settings.monitor_config()?;
            let fraction = inspect::diff(&project, &camera, &a, &b, &config)?;
            println!("{fraction:.8}");
        }

        Commands::Preview { camera, image, out } => {
            let (project, settings) = open()?;
            let config = settings.monitor_config()?;
            inspect::preview(&project, &camera, &image, &out, &config)?;
        }

        Commands::Repl => {
            let (project, settings) = open()?;
            project_watcher_cli::repl::run(project, settings.monitor_config()?)?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "project-watcher", &mut std::io::stdout());
        }
    }

    Ok(())
}
