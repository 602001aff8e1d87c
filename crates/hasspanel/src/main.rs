use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use hasspanel::client::HassApi;
use hasspanel::client::HassClient;
use hasspanel::config::Config;
use hasspanel::config::LoggingConfig;
use hasspanel::discovery;
use hasspanel::panel::Panel;
use hasspanel::panel::PanelEvent;
use hasspanel::panel::Selection;
use hasspanel::render;
use hasspanel::secret::SystemTokenStore;
use hasspanel::secret::TokenStore;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "hasspanel")]
#[command(about = "Toggle switches and read sensors on a Home Assistant server")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "hasspanel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List togglable entities (switches and lights)
    Switches,

    /// List sensors with their current values
    Sensors,

    /// Toggle a switch or light
    Toggle { entity_id: String },

    /// Show the state of one entity
    State { entity_id: String },

    /// Refresh periodically and log changes until Ctrl+C
    Watch,

    /// Manage the access token in the secret store
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Save a token read from stdin
    Set,

    /// Remove the saved token
    Clear,
}

fn init_logging(logging: &LoggingConfig) {
    let filter = logging
        .overrides
        .iter()
        .fold(
            Targets::new().with_default(LevelFilter::from(logging.level)),
            |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
        );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_logging(&config.logging);
    tracing::debug!("Loaded config from: {}", args.config.display());

    run_command(args.command, &config).await
}

async fn run_command(command: Command, config: &Config) -> anyhow::Result<()> {
    let tokens = Arc::new(SystemTokenStore::new(config.secret.clone()));
    let client = Arc::new(
        HassClient::new(&config.server, tokens.clone()).context("Failed to create HTTP client")?,
    );
    let base_url = config.server.base_url.as_str();

    match command {
        Command::Switches => {
            let records = discovery::try_discover_toggleable(client.as_ref(), base_url)
                .await
                .context("Failed to discover switches")?;
            print!("{}", render::render_list(&records, render::toggle_label));
        }
        Command::Sensors => {
            let states = client
                .states(base_url)
                .await
                .context("Failed to fetch states")?;
            let records = discovery::sensors(&states);
            let output = render::render_list(&records, |record| {
                let state = states
                    .iter()
                    .find(|s| s.entity_id == record.entity_id)
                    .map(|s| s.state.as_str())
                    .unwrap_or_default();
                render::sensor_label(record, state)
            });
            print!("{}", output);
        }
        Command::Toggle { entity_id } => {
            client
                .toggle(base_url, &entity_id)
                .await
                .with_context(|| format!("Failed to toggle {}", entity_id))?;
            println!("Toggled {}", entity_id);
        }
        Command::State { entity_id } => {
            let state = client
                .state(base_url, &entity_id)
                .await
                .with_context(|| format!("Failed to fetch state of {}", entity_id))?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Watch => run_watch(client, config).await,
        Command::Token { action } => {
            tokio::task::spawn_blocking(move || run_token(&action, tokens.as_ref()))
                .await
                .context("Token command panicked")??;
        }
    }

    Ok(())
}

fn run_token(action: &TokenAction, tokens: &dyn TokenStore) -> anyhow::Result<()> {
    match action {
        TokenAction::Set => {
            let mut token = String::new();
            std::io::stdin()
                .read_to_string(&mut token)
                .context("Failed to read token from stdin")?;
            tokens.store(&token).context("Failed to save token")?;
            println!("Token saved");
        }
        TokenAction::Clear => {
            tokens.clear().context("Failed to remove token")?;
            println!("Token removed");
        }
    }
    Ok(())
}

async fn run_watch(client: Arc<HassClient>, config: &Config) {
    let (handle, mut events) = Panel::spawn(
        client,
        config.server.base_url.clone(),
        Selection::from(&config.panel),
    );
    let ticker = handle.run_periodic(config.panel.refresh_interval());

    tracing::info!("Watching {}", config.server.base_url);
    tracing::info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PanelEvent::TogglesChanged(records)) => {
                    print!("{}", render::render_list(&records, render::toggle_label));
                }
                Some(PanelEvent::SensorsChanged(records)) => {
                    tracing::info!("Showing {} sensors", records.len());
                }
                Some(PanelEvent::SensorValues(readings)) => {
                    for reading in readings {
                        println!("{}", render::sensor_label(&reading.record, &reading.state));
                    }
                }
                Some(PanelEvent::Toggled { entity_id }) => println!("Toggled {}", entity_id),
                Some(PanelEvent::ToggleFailed { entity_id, error }) => {
                    tracing::error!("Failed to toggle {}: {}", entity_id, error);
                }
                None => break,
            },
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => tracing::info!("Received shutdown signal"),
                    Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
                }
                break;
            }
        }
    }

    ticker.abort();
    handle.shutdown().await;
}
