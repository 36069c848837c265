//! vcad-snap CLI - resolve snap requests from JSON files
//!
//! Loads a scene of objects and parts, runs one snap request against it and
//! prints the response as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vcad_snap::{
    CancelToken, EntryGeometry, ObjectStore, Scene, SnapEngine, SnapRequest, SnapSettings,
};

#[derive(Parser)]
#[command(name = "vcad-snap")]
#[command(about = "Resolve drafting snap requests", long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine settings (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one snap request and print the response
    Snap {
        /// Scene JSON with objects and parts
        scene: PathBuf,
        /// Request JSON, or `-` for stdin
        request: PathBuf,
        /// Pretty-print the response
        #[arg(short, long)]
        pretty: bool,
    },
    /// Validate a scene and the settings without snapping
    Check {
        /// Scene JSON with objects and parts
        scene: PathBuf,
        /// Requests to validate as well
        requests: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let settings = match &cli.config {
        Some(path) => SnapSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => SnapSettings::default(),
    };

    match cli.command {
        Commands::Snap {
            scene,
            request,
            pretty,
        } => {
            let store = ObjectStore::from_scene(load_scene(&scene)?);
            let request = load_request(&request)?;
            let engine = SnapEngine::new(Arc::new(store)).with_settings(settings);
            let response = engine.snap(&request, &CancelToken::new());
            let json = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{}", json);
        }
        Commands::Check { scene, requests } => {
            let scene = load_scene(&scene)?;
            let entries: usize = scene.objects.iter().map(|o| o.stream.entries.len()).sum();
            for object in &scene.objects {
                for entry in &object.stream.entries {
                    if let EntryGeometry::Part(part_id) = &entry.geometry {
                        if !scene.parts.iter().any(|p| p.id == *part_id) {
                            anyhow::bail!("object {} references unknown part {}", object.id, part_id);
                        }
                    }
                }
            }
            for path in &requests {
                let request = load_request(path)?;
                if request.snap_modes.is_empty() {
                    anyhow::bail!("{}: request has no snap modes", path.display());
                }
            }
            println!("Objects:  {}", scene.objects.len());
            println!("Parts:    {}", scene.parts.len());
            println!("Entries:  {}", entries);
            println!("Requests: {}", requests.len());
            println!("Aperture: {} px", settings.aperture);
            println!("Divisor:  {}", settings.divisor);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish(),
    )?;
    Ok(())
}

fn load_scene(path: &Path) -> Result<Scene> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scene {}", path.display()))?;
    let scene = Scene::from_json(&text).with_context(|| format!("parsing scene {}", path.display()))?;
    info!(
        objects = scene.objects.len(),
        parts = scene.parts.len(),
        "scene loaded"
    );
    Ok(scene)
}

fn load_request(path: &Path) -> Result<SnapRequest> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading request {}", path.display()))?
    };
    SnapRequest::from_json(&text).with_context(|| format!("parsing request {}", path.display()))
}
