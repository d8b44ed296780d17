//! ML Tester CLI
//!
//! Command-line front end for the request orchestrator.
//!
//! # Usage
//!
//! ```bash
//! # Point the session at a scoring endpoint
//! ml-tester configure --url https://my-endpoint.inference.ml.azure.com/score --api-key <key>
//!
//! # Send the default template, a file, or a form-built body
//! ml-tester send
//! ml-tester send --body-file request.json
//! ml-tester send --field age:number=42 --field active:boolean=true
//!
//! # Analyze an image with the Vision API through the relay
//! ml-tester vision-configure --endpoint https://my-vision.cognitiveservices.azure.com --api-key <key>
//! ml-tester analyze --url https://example.com/cat.jpg --template objects
//!
//! # List Vision templates and aspect-ratio presets
//! ml-tester template --vision
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ml_tester_client::builders::{
    aspect_ratio_preset, build_form_body, default_request_template, image_request_template,
    is_ratio_selected, load_field_uploads, load_image_data_url, toggle_ratio, FormField,
    VisionTemplate, ASPECT_RATIO_PRESETS,
};
use ml_tester_client::{
    ClientConfig, JsonFileStore, Orchestrator, OrchestratorError, ScoringInput, SendOutcome,
    Transport,
};
use ml_tester_shared::{FeatureName, ImageRef, ServiceType, VisionDescriptor};

/// Test Azure ML scoring endpoints and the Vision image-analysis API
#[derive(Parser)]
#[command(name = "ml-tester")]
#[command(about = "Test Azure ML scoring endpoints and the Vision image-analysis API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Relay URL (overrides configuration)
    #[arg(long, env = "ML_TESTER_RELAY_URL", global = true)]
    relay_url: Option<String>,

    /// Session storage directory (overrides configuration)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the scoring endpoint
    Configure {
        /// Scoring URL
        #[arg(long)]
        url: Option<String>,

        /// API key; `Bearer ` is added when missing
        #[arg(long)]
        api_key: Option<String>,

        /// Header carrying the key
        #[arg(long)]
        header_name: Option<String>,
    },

    /// Set the Vision endpoint and analysis options
    VisionConfigure {
        /// Vision resource endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Subscription key
        #[arg(long)]
        api_key: Option<String>,

        /// Comma-separated feature list
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<FeatureName>>,

        /// Apply a feature template (quick, objects, ocr, full, recommended)
        #[arg(long, conflicts_with = "features")]
        template: Option<VisionTemplate>,

        /// Comma-separated smart-crop aspect ratios
        #[arg(long, value_delimiter = ',')]
        ratios: Option<Vec<f64>>,

        /// Toggle a named aspect ratio (square, landscape, portrait, widescreen, vertical)
        #[arg(long)]
        toggle_ratio: Vec<String>,
    },

    /// Route scoring requests through the relay or call endpoints directly
    Proxy {
        #[arg(value_enum)]
        mode: Toggle,
    },

    /// Select the active service
    Service { service: ServiceType },

    /// Send a scoring request
    Send {
        /// Inline JSON body
        #[arg(long, conflicts_with_all = ["body_file", "field", "image"])]
        body: Option<String>,

        /// Read the JSON body from a file
        #[arg(long, conflicts_with_all = ["field", "image"])]
        body_file: Option<PathBuf>,

        /// Form field as name:kind=value (kinds: text, number, boolean, image, file)
        #[arg(long, conflicts_with = "image")]
        field: Vec<String>,

        /// Send an image using the single-column image template
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Analyze an image with the Vision API
    Analyze {
        /// Public image URL
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,

        /// Local image file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Feature template to apply before analyzing
        #[arg(long)]
        template: Option<VisionTemplate>,
    },

    /// Inspect or clear request history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Print the default scoring request body
    Template {
        /// List Vision feature templates and aspect-ratio presets instead
        #[arg(long)]
        vision: bool,
    },

    /// Show the current session settings
    Status,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recorded requests, newest first
    List,
    /// Show one recorded request
    Show { id: String },
    /// Remove all recorded requests
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

const USAGE_EXIT_CODE: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let mut config = ClientConfig::from_env().context("failed to load client configuration")?;
    if let Some(relay_url) = cli.relay_url.clone() {
        config.relay_url = relay_url;
    }
    if let Some(storage_dir) = cli.storage_dir.clone() {
        config.storage_dir = storage_dir;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let store = Arc::new(JsonFileStore::new(config.storage_dir.clone()));
    let transport = Transport::new(config.relay_url.clone())?;
    debug!(relay = %transport.relay_url(), storage = %store.dir().display(), "Client configured");
    let mut orchestrator = Orchestrator::load(store, transport).await;

    run(cli.command, &mut orchestrator).await
}

async fn run(command: Commands, orchestrator: &mut Orchestrator) -> Result<ExitCode> {
    match command {
        Commands::Configure {
            url,
            api_key,
            header_name,
        } => {
            let mut endpoint = orchestrator.endpoint().clone();
            if let Some(url) = url {
                endpoint.url = url;
            }
            if let Some(api_key) = api_key {
                endpoint.api_key = api_key;
            }
            if let Some(header_name) = header_name {
                endpoint.auth_header_name = header_name;
            }
            orchestrator.set_endpoint(endpoint).await;
            print_json(&masked_session(orchestrator))?;
        }

        Commands::VisionConfigure {
            endpoint,
            api_key,
            features,
            template,
            ratios,
            toggle_ratio: toggles,
        } => {
            let mut vision = orchestrator.vision().clone();
            if let Some(endpoint) = endpoint {
                vision.endpoint = endpoint;
            }
            if let Some(api_key) = api_key {
                vision.api_key = api_key;
            }
            if let Some(features) = features {
                vision.features = features.into_iter().collect();
            }
            if let Some(template) = template {
                vision.features = template.features();
            }
            if let Some(ratios) = ratios {
                vision.crop_ratios = ratios;
            }
            for name in toggles {
                let preset = aspect_ratio_preset(&name).with_context(|| {
                    let known: Vec<_> = ASPECT_RATIO_PRESETS.iter().map(|p| p.id).collect();
                    format!("Unknown aspect ratio '{}', expected one of {}", name, known.join(", "))
                })?;
                toggle_ratio(&mut vision.crop_ratios, preset.ratio);
            }
            orchestrator.set_vision(vision).await;
            print_json(&masked_session(orchestrator))?;
        }

        Commands::Proxy { mode } => {
            orchestrator.set_use_proxy(matches!(mode, Toggle::On)).await;
            println!("Proxy mode: {}", if orchestrator.use_proxy() { "on" } else { "off" });
        }

        Commands::Service { service } => {
            orchestrator.set_service(service).await;
            println!("Service: {}", orchestrator.service());
        }

        Commands::Send {
            body,
            body_file,
            field,
            image,
        } => {
            let input = if let Some(body) = body {
                ScoringInput::json(body)
            } else if let Some(path) = body_file {
                let body = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                ScoringInput::json(body)
            } else if let Some(path) = image {
                let data_url = load_image_data_url(&path).await?;
                ScoringInput::image(image_request_template(&data_url), data_url)
            } else if !field.is_empty() {
                let mut fields = field
                    .iter()
                    .map(|argument| FormField::parse(argument))
                    .collect::<ml_tester_client::Result<Vec<_>>>()?;
                load_field_uploads(&mut fields).await?;
                ScoringInput::json(build_form_body(&fields))
            } else {
                ScoringInput::json(default_request_template())
            };

            return match orchestrator.send_scoring(input).await {
                Ok(outcome) => report(&outcome),
                Err(err) => rejected(err),
            };
        }

        Commands::Analyze {
            url,
            file,
            template,
        } => {
            if let Some(template) = template {
                let mut vision = orchestrator.vision().clone();
                vision.features = template.features();
                orchestrator.set_vision(vision).await;
            }

            let image = match (url, file) {
                (Some(url), _) => Some(ImageRef::Url(url)),
                (None, Some(path)) => Some(ImageRef::InlineBase64(load_image_data_url(&path).await?)),
                (None, None) => None,
            };

            return match orchestrator.analyze_image(image).await {
                Ok(outcome) => report(&outcome),
                Err(err) => rejected(err),
            };
        }

        Commands::History { action } => match action {
            HistoryAction::List => {
                for entry in orchestrator.history().iter() {
                    println!(
                        "{}  {}  {:>3}  {:>6}ms  {}{}",
                        entry.id,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.status_code,
                        entry.duration_ms,
                        entry.endpoint,
                        if entry.is_image { "  [image]" } else { "" }
                    );
                }
            }
            HistoryAction::Show { id } => {
                let entry = orchestrator
                    .history()
                    .find(&id)
                    .with_context(|| format!("No history entry with id {}", id))?;
                print_json(entry)?;
            }
            HistoryAction::Clear => {
                orchestrator.clear_history().await;
                println!("History cleared");
            }
        },

        Commands::Template { vision: false } => println!("{}", default_request_template()),

        Commands::Template { vision: true } => {
            print_json(&vision_presets(orchestrator.vision()))?
        }

        Commands::Status => print_json(&masked_session(orchestrator))?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Print the envelope, and the failure message plus any hint on stderr
fn report(outcome: &SendOutcome) -> Result<ExitCode> {
    print_json(&outcome.envelope)?;

    if outcome.is_success() {
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(message) = &outcome.error {
        eprintln!("{}", message);
    }
    if outcome.cors_hint {
        eprintln!("Hint: enable proxy mode with `ml-tester proxy on`.");
    }
    Ok(ExitCode::FAILURE)
}

/// Sends stopped before dispatch exit with a usage code; anything else is fatal
fn rejected(err: OrchestratorError) -> Result<ExitCode> {
    if err.is_precondition() {
        eprintln!("{}", err);
        Ok(ExitCode::from(USAGE_EXIT_CODE))
    } else {
        Err(err.into())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mask(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("****{}", tail)
    }
}

/// Session settings with keys masked
fn masked_session(orchestrator: &Orchestrator) -> serde_json::Value {
    let endpoint = orchestrator.endpoint();
    let vision = orchestrator.vision();
    serde_json::json!({
        "service": orchestrator.service(),
        "useProxy": orchestrator.use_proxy(),
        "endpoint": {
            "url": endpoint.url,
            "apiKey": mask(&endpoint.api_key),
            "keyHeaderName": endpoint.auth_header_name,
        },
        "vision": {
            "endpoint": vision.endpoint,
            "apiKey": mask(&vision.api_key),
            "features": vision.features,
            "cropRatios": vision.crop_ratios,
        },
        "relayUrl": orchestrator.relay_url(),
        "historyEntries": orchestrator.history().len(),
    })
}

/// Vision templates with their features, and the aspect-ratio presets with
/// the ones currently selected marked
fn vision_presets(vision: &VisionDescriptor) -> serde_json::Value {
    let templates: Vec<_> = VisionTemplate::ALL
        .iter()
        .map(|template| {
            serde_json::json!({
                "name": template.to_string(),
                "description": template.description(),
                "features": template.features(),
            })
        })
        .collect();

    let ratios: Vec<_> = ASPECT_RATIO_PRESETS
        .iter()
        .map(|preset| {
            serde_json::json!({
                "id": preset.id,
                "ratio": preset.ratio,
                "description": preset.description,
                "selected": is_ratio_selected(&vision.crop_ratios, preset.ratio),
            })
        })
        .collect();

    serde_json::json!({ "templates": templates, "aspectRatios": ratios })
}

/// Initialize logging
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "ml_tester=debug,ml_tester_client=debug"
    } else {
        "ml_tester=warn,ml_tester_client=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}
