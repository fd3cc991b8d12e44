//! `audit-assistant` - drive audits and the clarification gate from a shell
//!
//! ```bash
//! audit-assistant health
//! audit-assistant ask "What is our policy on password rotation?" --kb
//! audit-assistant pending
//! audit-assistant resume --kb --company
//! audit-assistant audit --script itgc.xlsx --evidence access.pdf --evidence backups.pdf
//! ```

use anyhow::{Context, Result};
use audit_clarification::{ClarificationController, FileStore};
use audit_cli::commands;
use audit_cli::config::AssistantConfig;
use audit_gateway::{BackendGateway, ContextFlags, HttpGateway};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "audit-assistant")]
#[command(version)]
#[command(about = "Audit workflow and agent clarification client")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Durable state file (overrides config)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Copy)]
struct ContextArgs {
    /// Knowledge base is loaded
    #[arg(long)]
    kb: bool,

    /// Company context is loaded
    #[arg(long)]
    company: bool,

    /// Evidence is loaded
    #[arg(long)]
    evidence: bool,
}

impl From<ContextArgs> for ContextFlags {
    fn from(args: ContextArgs) -> Self {
        ContextFlags::none()
            .with_kb(args.kb)
            .with_company(args.company)
            .with_evidence(args.evidence)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Ping the backend
    Health,

    /// Check whether a query can be answered with the loaded context
    Ask {
        query: String,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Show the pending clarification, if any
    Pending,

    /// Drop the pending clarification
    Cancel,

    /// Resolve the pending clarification and re-run its query
    Resume {
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Run a full audit: script, evidence, workpaper
    Audit {
        /// Test script spreadsheet
        #[arg(long)]
        script: PathBuf,

        /// Evidence files (repeatable)
        #[arg(long, required = true)]
        evidence: Vec<PathBuf>,

        /// Directory for the downloaded workpaper
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("command failed: {e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AssistantConfig::load(cli.config.as_deref())?.with_overrides(
        cli.base_url,
        cli.state_file,
    );
    audit_cli::logging::init(&config.logging)?;

    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(config.gateway_config()?)?);
    tracing::debug!(base_url = %config.gateway.base_url, "gateway ready");

    let open_agent = || -> Result<ClarificationController> {
        let store = FileStore::open(&config.storage.state_file).with_context(|| {
            format!("opening state file {}", config.storage.state_file.display())
        })?;
        Ok(ClarificationController::new(gateway.clone(), Arc::new(store)))
    };

    match cli.command {
        Command::Health => {
            let status = commands::health(gateway.as_ref()).await?;
            println!("backend {}: {}", config.gateway.base_url, status.status);
        }
        Command::Ask { query, context } => {
            let agent = open_agent()?;
            let outcome = commands::ask(&agent, &query, context.into()).await?;
            println!("{}", commands::render_outcome(&outcome));
        }
        Command::Pending => {
            let agent = open_agent()?;
            println!("{}", commands::render_pending(agent.pending().as_ref()));
        }
        Command::Cancel => {
            open_agent()?.cancel()?;
            println!("pending clarification cleared");
        }
        Command::Resume { context } => {
            let agent = open_agent()?;
            match agent.resume(context.into()).await? {
                Some(outcome) => println!("{}", commands::render_outcome(&outcome)),
                None => println!("{}", commands::render_pending(None)),
            }
        }
        Command::Audit {
            script,
            evidence,
            out,
        } => {
            let run = commands::run_audit(gateway.clone(), &script, &evidence, &out).await?;
            print!("{}", commands::render_session(&run.session));
            println!("workpaper written to {}", run.workpaper_path.display());
        }
    }
    Ok(())
}
