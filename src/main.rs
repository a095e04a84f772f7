// OpsCenter Client - Main Entry Point
//
// Command-line front end for the connection subsystem:
// - Candidate generation and server discovery
// - Session establishment with credential fallback
// - Connection diagnostics
// - One-off protocol calls and a chat loop

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opscenter_client::assistant::{CatalogueResponder, Conversation};
use opscenter_client::config::Config;
use opscenter_client::diagnostics::{Diagnostics, DEFAULT_ORIGIN};
use opscenter_client::discovery::{
    generate_candidates, Discover, DiscoveryOrchestrator, HttpProbe, PageContext,
    ValidatedDiscovery,
};
use opscenter_client::mcp::{HttpTransport, McpMethod};
use opscenter_client::metrics;
use opscenter_client::session::{FileStore, Session, SessionManager, SessionStatus};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

type CliSessionManager = SessionManager<
    ValidatedDiscovery<DiscoveryOrchestrator<HttpProbe>, Diagnostics>,
    HttpTransport,
    FileStore,
>;

/// OpsCenter: discover, connect to and diagnose an OpsCenter MCP server
#[derive(Parser, Debug)]
#[command(name = "opscenter")]
#[command(author = "OpsCenter Contributors")]
#[command(version)]
#[command(about = "OpsCenter MCP client with automatic server discovery", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.config/opscenter/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the discovery candidates for a page address
    Candidates {
        /// Page address the client is served from
        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,
    },
    /// Run discovery and print the server descriptor
    Discover {
        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,
    },
    /// Establish a session (manual connect when --url is given)
    Connect {
        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,

        /// Server base address; skips discovery
        #[arg(long)]
        url: Option<String>,

        /// Bearer token for --url
        #[arg(long)]
        token: Option<String>,
    },
    /// Run the full diagnostic battery against an address
    Diagnose {
        /// Server base address
        base: String,

        /// Bearer token for the authenticated handshake
        #[arg(long)]
        token: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// One-line reachability and descriptor check
    QuickCheck {
        /// Server base address
        base: String,
    },
    /// Connect, then invoke one protocol method
    Call {
        /// e.g. resources/list, tools/call
        method: String,

        /// JSON params object
        #[arg(long)]
        params: Option<String>,

        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,
    },
    /// Interactive assistant over the connected server's catalogue
    Chat {
        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,
    },
    /// Forget the saved server address and token
    Disconnect,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    init_tracing(&config, args.verbose)?;
    metrics::init().context("Failed to register metrics")?;

    info!("OpsCenter client v{} starting...", env!("CARGO_PKG_VERSION"));

    match args.command {
        Some(Commands::Candidates { origin }) => {
            let page = parse_page(&origin)?;
            for candidate in generate_candidates(&page) {
                println!("{candidate}");
            }
        }
        Some(Commands::Discover { origin }) => {
            let page = parse_page(&origin)?;
            let orchestrator = orchestrator(&config, &page)?;
            match orchestrator.discover().await {
                Some(descriptor) => println!("{}", serde_json::to_string_pretty(&descriptor)?),
                None => anyhow::bail!(
                    "No server found among {} candidates",
                    orchestrator.candidates().len()
                ),
            }
        }
        Some(Commands::Connect { origin, url, token }) => {
            let mut manager = session_manager(&config, &origin)?;
            let session = connect(&mut manager, &config, url, token).await?;
            print_session(&session)?;
        }
        Some(Commands::Diagnose { base, token, json }) => {
            let token = token.or_else(|| config.server.token.clone());
            let report = diagnostics(&config, &config.discovery.origin)?
                .diagnose(&base, token.as_deref())
                .await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
        }
        Some(Commands::QuickCheck { base }) => {
            let check = diagnostics(&config, &config.discovery.origin)?
                .quick_check(&base)
                .await;
            println!("{}", check.message);
            if !check.success {
                anyhow::bail!("Quick check failed for {}", base);
            }
        }
        Some(Commands::Call {
            method,
            params,
            origin,
        }) => {
            let method: McpMethod = method
                .parse()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let params: Option<serde_json::Value> = params
                .map(|p| serde_json::from_str(&p))
                .transpose()
                .context("--params must be a JSON object")?;

            let mut manager = session_manager(&config, &origin)?;
            connect(&mut manager, &config, None, None).await?;
            let client = manager
                .client()
                .context("Session connected without a client")?;
            let result = client
                .call(method, params)
                .await
                .map_err(|e| anyhow::anyhow!(opscenter_client::ConnectionError::from(e).user_message()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some(Commands::Chat { origin }) => {
            let mut manager = session_manager(&config, &origin)?;
            connect(&mut manager, &config, None, None).await?;
            chat_mode(&mut manager).await?;
        }
        Some(Commands::Disconnect) => {
            let mut manager = session_manager(&config, &config.discovery.origin)?;
            manager.disconnect();
            println!("Saved session cleared");
        }
        None => {
            info!("No command specified. Use \"opscenter --help\" for usage.");
        }
    }

    if args.metrics {
        print!("{}", metrics::gather_metrics()?);
    }

    Ok(())
}

fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

fn parse_page(origin: &str) -> Result<PageContext> {
    PageContext::parse(origin).with_context(|| format!("Invalid page address '{}'", origin))
}

fn transport(config: &Config, origin: &str) -> Result<HttpTransport> {
    Ok(HttpTransport::new()?
        .with_timeout(config.transport_timeout())
        .with_origin(origin))
}

fn probe(config: &Config) -> Result<HttpProbe> {
    Ok(HttpProbe::new()?.with_timeouts(
        Duration::from_millis(config.discovery.reachability_timeout_ms),
        Duration::from_millis(config.discovery.descriptor_timeout_ms),
    ))
}

fn orchestrator(config: &Config, page: &PageContext) -> Result<DiscoveryOrchestrator<HttpProbe>> {
    Ok(DiscoveryOrchestrator::from_page(probe(config)?, page)
        .with_batch_size(config.discovery.batch_size)
        .with_overall_timeout(Duration::from_millis(config.discovery.overall_timeout_ms)))
}

fn diagnostics(config: &Config, origin: &str) -> Result<Diagnostics> {
    Ok(Diagnostics::new(
        probe(config)?,
        transport(config, origin)?,
        origin,
    ))
}

fn session_manager(config: &Config, origin: &str) -> Result<CliSessionManager> {
    let page = parse_page(origin)?;
    let discovery = ValidatedDiscovery::new(
        orchestrator(config, &page)?,
        diagnostics(config, &page.origin())?,
    );
    Ok(SessionManager::new(
        discovery,
        transport(config, &page.origin())?,
        config.credential_store(),
        page,
    )
    .with_options(config.session_options()))
}

/// Manual connect when an address is known, otherwise the automatic chain
async fn connect(
    manager: &mut CliSessionManager,
    config: &Config,
    url: Option<String>,
    token: Option<String>,
) -> Result<Session> {
    match url.or_else(|| config.server.base_address.clone()) {
        Some(url) => {
            let token = token
                .or_else(|| config.server.token.clone())
                .unwrap_or_else(|| manager.resolved_credential());
            manager.connect_manual(&url, &token).await.map_err(|e| {
                error!("Connection failed: {}", e);
                anyhow::anyhow!(e.user_message())
            })
        }
        None => {
            let session = manager.establish().await;
            if session.status == SessionStatus::Disconnected {
                anyhow::bail!(
                    "No server connected. Run `opscenter connect --url <base> --token <token>` to connect manually."
                );
            }
            Ok(session)
        }
    }
}

fn print_session(session: &Session) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(session)?);
    Ok(())
}

/// Line-oriented chat loop; `exit` or end of input stops it
async fn chat_mode(manager: &mut CliSessionManager) -> Result<()> {
    let client = manager
        .client_mut()
        .context("Session connected without a client")?;
    let responder = CatalogueResponder::from_client(client)
        .await
        .map_err(|e| anyhow::anyhow!(opscenter_client::ConnectionError::from(e).user_message()))?;
    let mut conversation = Conversation::new(responder);

    println!("Connected. Type \"help\" for ideas, \"exit\" to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let reply = conversation.send(line).await;
        println!("{}", reply.content);
    }

    Ok(())
}
