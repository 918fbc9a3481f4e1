use anyhow::Result;
use clap::Parser;
use mail_triage::auth::{self, AuthProvider, GmailAuthProvider, REQUIRED_SCOPES};
use mail_triage::cli::{self, Cli, Commands, ConsoleNotifier, TrackerCommand};
use mail_triage::client::{MailClient, ProductionGmailClient, SharedClientFactory};
use mail_triage::config::Config;
use mail_triage::error::TriageError;
use mail_triage::notify::Notifier;
use mail_triage::pages::{CleanPage, TrackerPageRequest};
use mail_triage::resolution::ResolutionAction;
use mail_triage::store::ThreadTrackerStore;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: mail-triage --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // aws-lc-rs everywhere but Windows, where ring builds without NASM/CMake
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mail_triage=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mail_triage=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                tracing::info!("Removed existing token cache");
            }

            let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope(REQUIRED_SCOPES[0])
                .doit()
                .await
                .map_err(TriageError::from)?;
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );

            Ok(())
        }

        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(TriageError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&output, Config::example_toml()).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - tracker.page_size: Trackers shown per page");
            println!("  - tracker.stale_after_secs: How long fetched threads stay fresh");
            println!("  - store.backend / store.path: Where trackers are kept");

            Ok(())
        }

        Commands::Clean { step } => {
            let config = Config::load(&cli.config).await?;

            let hub = Arc::new(auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?);
            let client: Arc<dyn MailClient> = Arc::new(ProductionGmailClient::new(
                Arc::clone(&hub),
                config.tracker.max_concurrent_requests,
            ));
            let page = CleanPage::new(
                Arc::new(GmailAuthProvider::new(hub)),
                Arc::new(SharedClientFactory::new(client)),
            );

            let view = page.render(step.as_deref()).await?;
            println!("{}", cli::render_clean_view(&view));
            Ok(())
        }

        Commands::Tracker { command } => {
            let config = Config::load(&cli.config).await?;

            let hub = Arc::new(auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?);
            let auth: Arc<dyn AuthProvider> = Arc::new(GmailAuthProvider::new(Arc::clone(&hub)));
            let store = cli::open_store(&config.store).await?;
            let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

            match command {
                TrackerCommand::List {
                    tracker_type,
                    resolved,
                    page,
                    enabled,
                    interactive,
                } => {
                    let request = TrackerPageRequest::new(tracker_type, resolved)
                        .page(page)
                        .enabled(enabled.as_deref());
                    list_trackers(&config, hub, auth, store, notifier, &request, interactive)
                        .await?;
                }
                TrackerCommand::NeedsAction { page, interactive } => {
                    let request = TrackerPageRequest::needs_action().page(page);
                    list_trackers(&config, hub, auth, store, notifier, &request, interactive)
                        .await?;
                }
                TrackerCommand::Resolve { thread_id } => {
                    let action = ResolutionAction::new(store, notifier);
                    cli::run_set_resolved(auth.as_ref(), &action, &thread_id, true).await?;
                }
                TrackerCommand::Unresolve { thread_id } => {
                    let action = ResolutionAction::new(store, notifier);
                    cli::run_set_resolved(auth.as_ref(), &action, &thread_id, false).await?;
                }
                TrackerCommand::Track {
                    thread_id,
                    tracker_type,
                } => {
                    let tracker =
                        cli::run_track(auth.as_ref(), store.as_ref(), &thread_id, tracker_type)
                            .await?;
                    println!(
                        "Tracking {} as {} ({})",
                        tracker.thread_id, tracker.tracker_type, tracker.id
                    );
                }
            }
            Ok(())
        }
    }
}

async fn list_trackers(
    config: &Config,
    hub: Arc<auth::GmailHub>,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn ThreadTrackerStore>,
    notifier: Arc<dyn Notifier>,
    request: &TrackerPageRequest,
    interactive: bool,
) -> Result<()> {
    let client: Arc<dyn MailClient> = Arc::new(ProductionGmailClient::new(
        hub,
        config.tracker.max_concurrent_requests,
    ));
    let page = cli::build_tracker_page(config, auth, store, Arc::clone(&client), notifier)?;
    cli::run_tracker_list(&page, client, request, interactive).await?;
    Ok(())
}
