use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use rs_mail_responder::config::{Config, load_config};
use rs_mail_responder::controller::Controller;
use rs_mail_responder::ingest::run_ingest;
use rs_mail_responder::logging;
use rs_mail_responder::mail::ImapGateway;
use rs_mail_responder::rag::document_embedder;
use rs_mail_responder::rag::responder::Responder;
use rs_mail_responder::secrets;
use rs_mail_responder::store::xlsx::XlsxCache;
use rs_mail_responder::terminal::{run_tui, state::AppState};

#[derive(Parser)]
#[command(name = "rs_mail_responder")]
#[command(about = "Sentiment-aware email responder (TUI + ingestion)", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the interactive responder (default)
    Tui,

    /// Build the vector index from the documents directory
    Ingest {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        vector_dir: Option<PathBuf>,
    },

    /// Store the mailbox password in keyring
    SetPassword {
        #[arg(long)]
        user: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref())
        .map_err(|e| anyhow!("Configuration error: {e}"))?;

    match cli.cmd.unwrap_or(Command::Tui) {
        Command::SetPassword { user } => {
            eprintln!("Paste password (end with Ctrl-D):");
            let mut password = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut password)?;
            let password = password.trim_end_matches(['\r', '\n']);
            secrets::save_password(&user, password)?;
            println!("Saved password for {}", user);
            Ok(())
        }

        Command::Ingest {
            data_dir,
            vector_dir,
        } => {
            if let Some(d) = data_dir {
                cfg.paths.data_dir = d;
            }
            if let Some(d) = vector_dir {
                cfg.paths.vector_dir = d;
            }
            let _log = logging::init(&cfg)?;

            let embedder = document_embedder(&cfg)?;
            let report = run_ingest(&cfg, embedder.as_ref()).inspect_err(|e| {
                log::error!("ingestion failed: {e:#}");
            })?;
            info!(
                "ingested {} documents as {} chunks into {}",
                report.documents,
                report.chunks,
                report.vector_dir.display()
            );
            println!(
                "Ingested {} documents ({} chunks) into {}",
                report.documents,
                report.chunks,
                report.vector_dir.display()
            );
            Ok(())
        }

        Command::Tui => {
            let _log = logging::init(&cfg)?;
            tui(&cfg)
        }
    }
}

fn tui(cfg: &Config) -> Result<()> {
    let cache = XlsxCache::new(&cfg.paths.cache_file);
    let mail = ImapGateway::from_config(cfg);
    let responder = Responder::from_config(cfg)?;
    let controller = Controller::new(&cache, &mail, &responder).with_session(cfg);

    let user = cfg.imap.user.clone().unwrap_or_default();
    let mut password = String::new();
    if cfg.imap.remember_password && !user.is_empty() {
        match secrets::load_password(&user) {
            Ok(Some(p)) => password = p,
            Ok(None) => {}
            Err(e) => warn!("could not read password from keyring: {e}"),
        }
    }

    let mut state = AppState::new(user, password);
    state.remember_password = cfg.imap.remember_password;

    info!("starting responder on {}", cfg.paths.cache_file.display());
    run_tui(&controller, state)
}
