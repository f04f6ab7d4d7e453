//! Canvas Pilot - interactive entry point
//!
//! Drives the command pipeline against the in-memory reference host: type a
//! natural-language command, watch it generate, validate and execute. Runs
//! a plain prompt loop; the docking panel of a real host would sit where
//! this REPL does.

use canvas_pilot::core::config::PipelineConfig;
use canvas_pilot::core::error::Result;
use canvas_pilot::history::CommandStatus;
use canvas_pilot::host::document::MemoryHost;
use canvas_pilot::host::HostAdapter;
use canvas_pilot::llm::client::{ClientConfig, GenerationClient};
use canvas_pilot::pipeline::{CommandOutcome, CommandPipeline, PipelineState};
use canvas_pilot::script::policy::Policy;

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "canvas-pilot", about = "Natural-language commands for a raster editor")]
struct Args {
    /// Validation policy TOML (built-in policy if omitted)
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Pipeline configuration TOML (defaults if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// History persistence file (loaded on start, saved on exit)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Print generated scripts after each command
    #[arg(long)]
    show_code: bool,

    /// Document width for the demo document
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Document height for the demo document
    #[arg(long, default_value_t = 768)]
    height: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvas_pilot=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    config.validate()?;

    let policy = match &args.policy {
        Some(path) => Policy::from_toml_file(path)?,
        None => Policy::default(),
    };
    tracing::info!(version = policy.version, "policy loaded");

    let client_config = ClientConfig::from_env(&config)?;
    let client = GenerationClient::new(client_config)?;

    let history = match &args.history {
        Some(path) if path.exists() => {
            canvas_pilot::history::HistoryStore::load(path, config.history_capacity)?
        }
        _ => canvas_pilot::history::HistoryStore::new(config.history_capacity),
    };

    let host: Arc<Mutex<dyn HostAdapter>> = Arc::new(Mutex::new(MemoryHost::with_document(
        "untitled",
        args.width,
        args.height,
    )));

    let rt = Runtime::new()?;
    let _guard = rt.enter();
    let pipeline = CommandPipeline::with_history(
        Arc::new(client),
        Arc::clone(&host),
        Arc::new(policy),
        config,
        history,
    );

    // Echo state transitions so the user sees generating/executing progress
    let mut states = pipeline.subscribe();
    rt.spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow();
            match state {
                PipelineState::Generating | PipelineState::Executing => {
                    println!("  [{}...]", state.as_str());
                }
                _ => {}
            }
        }
    });

    println!("\n=== CANVAS PILOT ===");
    println!("Natural-language commands against an in-memory document");
    println!();
    println!("Commands:");
    println!("  status / s      - Show document layers");
    println!("  history / h     - Show command history");
    println!("  quit / q        - Exit");
    println!("  <any text>      - Natural-language command");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "q" {
            break;
        }
        if input == "status" || input == "s" {
            display_status(&host);
            continue;
        }
        if input == "history" || input == "h" {
            for summary in pipeline.history() {
                println!("{:>3}. [{}] {}", summary.seq, summary.status.as_str(), summary.user_text);
            }
            continue;
        }

        let receiver = match pipeline.submit(input) {
            Ok(receiver) => receiver,
            Err(e) => {
                println!("Could not submit command: {}", e);
                continue;
            }
        };

        match rt.block_on(receiver) {
            Ok(CommandOutcome::Succeeded {
                script, mutations, ..
            }) => {
                println!("Done: {}", mutations.join(", "));
                if args.show_code {
                    println!("--- script ---\n{}\n--------------", script);
                }
            }
            Ok(CommandOutcome::Rejected { details, .. }) => {
                println!("Command rejected:");
                for detail in details {
                    println!("  - {}", detail);
                }
            }
            Ok(CommandOutcome::Failed { reason, .. }) => {
                println!("{}", reason);
            }
            Err(_) => {
                println!("Pipeline stopped unexpectedly");
            }
        }
    }

    if let Some(path) = &args.history {
        pipeline.save_history(path)?;
        let failed = pipeline
            .history()
            .iter()
            .filter(|s| s.status != CommandStatus::Succeeded)
            .count();
        tracing::info!(path = %path.display(), failed, "history saved");
    }

    Ok(())
}

fn display_status(host: &Arc<Mutex<dyn HostAdapter>>) {
    let host = host.lock().unwrap_or_else(|p| p.into_inner());
    match host.document_info() {
        Ok(info) => {
            println!(
                "Document: {} ({}x{}, {})",
                info.name, info.width, info.height, info.color_model
            );
            match host.layers() {
                Ok(layers) if layers.is_empty() => println!("  (no layers)"),
                Ok(layers) => {
                    for layer in layers {
                        println!(
                            "  '{}' ({}, {}, opacity {})",
                            layer.name,
                            layer.kind.as_str(),
                            if layer.visible { "visible" } else { "hidden" },
                            layer.opacity
                        );
                    }
                }
                Err(e) => println!("  could not list layers: {}", e),
            }
        }
        Err(_) => println!("No document open."),
    }
}
