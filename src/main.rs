//! Character Forge
//!
//! Command-line front end: stages a photo, stylizes it, optionally builds a
//! 3D model and prints each workflow phase as it happens.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use character_forge::core::connectivity::ConnectivityStatus;
use character_forge::state::{ClientSettings, GalleryView, ModelJobStatus, Phase, SelectedFile, StyleId};
use character_forge::utils::{progress_label, resolve_url};
use character_forge::{HttpBackend, JobCoordinator, ModelOutcome, SubmitOutcome};

#[derive(Debug, Parser)]
#[command(name = "character-forge", version, about = "Photo to stylized character to 3D model")]
struct Cli {
    /// JSON settings file; missing file means defaults
    #[arg(long, env = "CHARACTER_FORGE_CONFIG", default_value = "character-forge.json")]
    config: PathBuf,

    /// Overrides the configured server root
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe the stylization server
    Health,
    /// List style presets
    Styles,
    /// List the server gallery
    Gallery,
    /// Delete one gallery image
    Delete { image_id: String },
    /// Stylize a photo, optionally followed by 3D generation
    Transform {
        file: PathBuf,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        denoise: Option<f64>,
        /// Request a 3D model after the transform succeeds
        #[arg(long)]
        model: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("character_forge=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = ClientSettings::load(&cli.config)?;
    settings.apply_env_overrides();
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }

    let backend = Arc::new(HttpBackend::new(&settings)?);
    let base_url = backend.base_url().clone();
    let coordinator = JobCoordinator::new(backend, &settings);

    match cli.command {
        Command::Health => {
            let status = coordinator.connectivity().probe().await;
            println!("{}", status.label());
            if let ConnectivityStatus::Unreachable { reason } = status {
                println!("  {}", reason);
            }
        }
        Command::Styles => {
            let catalog = coordinator.fetch_styles().await;
            for (id, preset) in &catalog.styles {
                let strength = preset
                    .recommended_denoise
                    .unwrap_or(catalog.recommended_strength);
                println!("{:<18} {:<24} {:.2}", id.as_str(), catalog.display_name(id), strength);
            }
        }
        Command::Gallery => {
            let view = coordinator.gallery().refresh().await?;
            print_gallery(&view, &base_url);
        }
        Command::Delete { image_id } => {
            let view = coordinator.delete_gallery_entry(&image_id).await?;
            println!("Deleted {}", image_id);
            print_gallery(&view, &base_url);
        }
        Command::Transform {
            file,
            style,
            denoise,
            model,
        } => {
            let (status, _) = coordinator.init().await;
            println!("{}", status.label());

            let mut events = coordinator.subscribe();
            let selected = SelectedFile::from_path(&file).await?;
            coordinator.stage_file(selected).await?;
            if let Some(style) = style {
                coordinator.select_style(StyleId::new(style));
            }
            if let Some(strength) = denoise {
                let params = coordinator.set_denoising(strength);
                println!("Denoising strength {}", params.label());
            }

            match coordinator.submit_transform().await? {
                SubmitOutcome::Completed(result) => {
                    println!("Stylized image {}", result.image_id);
                    println!("  {}", resolve_url(&base_url, &result.image_url));
                }
                SubmitOutcome::AlreadyRunning | SubmitOutcome::Superseded => return Ok(()),
            }
            if !model {
                return Ok(());
            }

            match coordinator.request_model().await? {
                ModelOutcome::Polling { task_id, .. } => println!("3D task {}", task_id),
                ModelOutcome::DemoMode { message } | ModelOutcome::Failed { message } => {
                    println!("{}", message);
                    return Ok(());
                }
                ModelOutcome::Superseded => return Ok(()),
            }

            loop {
                match events.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "phase events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
                let state = coordinator.snapshot();
                match state.phase() {
                    Phase::ModelGenerating => {
                        if let Some(progress) = state.model().and_then(|model| model.progress()) {
                            println!("  {}", progress_label(progress));
                        }
                    }
                    Phase::ModelReady => {
                        if let Some(ModelJobStatus::Succeeded { artifact_urls, .. }) =
                            state.model().map(|model| &model.status)
                        {
                            for (format, url) in artifact_urls {
                                println!("{:<6} {}", format, url);
                            }
                        }
                        break;
                    }
                    Phase::ModelDemo => {
                        if let Some(ModelJobStatus::DemoMode { message }) =
                            state.model().map(|model| &model.status)
                        {
                            println!("{}", message);
                        }
                        break;
                    }
                    Phase::ModelFailed => {
                        println!("{}", state.last_error().unwrap_or("3D generation failed"));
                        break;
                    }
                    _ => {}
                }
            }
            coordinator.shutdown();
        }
    }

    Ok(())
}

fn print_gallery(view: &GalleryView, base_url: &url::Url) {
    match view {
        GalleryView::NotLoaded => println!("Gallery not loaded"),
        GalleryView::Empty => println!("No images yet"),
        GalleryView::Entries(entries) => {
            for entry in entries {
                println!("{:<36} {:<16} {}", entry.id, entry.style, entry.resolved_url(base_url));
            }
        }
    }
}
