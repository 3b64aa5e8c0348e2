use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};

use hostlink::api::{create_router, AppState};
use hostlink::auth::AuthState;
use hostlink::capture::{h264, FrameSource, JpegEncoder, ScreenCapturer};
use hostlink::chat::{ChatLog, ChatMessage};
use hostlink::clipboard::{ClipboardBridge, SystemClipboard};
use hostlink::config::{self, AppConfig};
use hostlink::input::{EnigoBackend, Injector};
use hostlink::stream::StreamController;
use hostlink::terminal::Registry;
use hostlink::tls;
use hostlink::ws::protocol::{self, WireMessage};
use hostlink::ws::{Encoding, Hub};

const APP_NAME: &str = "hostlink";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = config::config_path(cli.common.config.clone())?;

    match cli.command {
        Command::Serve(cmd) => {
            let cfg = config::load_or_init(&config_path)?;
            init_logging(&cli.common, &cfg)?;
            async_serve(cfg, config_path, cmd)
        }
        Command::Init(cmd) => handle_init(&config_path, cmd),
        Command::Config { command } => handle_config(&config_path, command),
        Command::Token(cmd) => {
            let cfg = config::load_or_init(&config_path)?;
            handle_token(&cfg, cmd)
        }
    }
}

#[tokio::main]
async fn async_serve(cfg: AppConfig, config_path: PathBuf, cmd: ServeCommand) -> Result<()> {
    handle_serve(cfg, config_path, cmd).await
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "hostlink - self-hosted remote desktop server.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -v)
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTPS/WSS server
    Serve(ServeCommand),
    /// Create config directories and default files
    Init(InitCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Mint an access token for a username
    Token(TokenCommand),
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Clone, Args)]
struct TokenCommand {
    /// Username embedded in the token
    #[arg(short, long)]
    username: String,
    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    ttl_hours: i64,
}

fn init_logging(common: &CommonOpts, cfg: &AppConfig) -> Result<()> {
    if common.quiet {
        log::set_max_level(LevelFilter::Off);
        return Ok(());
    }

    let level = effective_log_level(common, cfg);
    let level_str = match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level_str},tower_http=warn")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(io::stderr().is_terminal()))
        .try_init()
        .ok();

    // Compatibility init so `log` macro users share the same filtering.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level_str));
    builder.filter_level(level);
    builder.try_init().ok();

    Ok(())
}

fn effective_log_level(common: &CommonOpts, cfg: &AppConfig) -> LevelFilter {
    if common.debug {
        return LevelFilter::Debug;
    }
    match common.verbose {
        0 => cfg
            .logging
            .level
            .parse()
            .unwrap_or(LevelFilter::Info),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn handle_init(config_path: &std::path::Path, cmd: InitCommand) -> Result<()> {
    if config_path.exists() && !cmd.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    config::write_default_config(config_path)?;
    println!("wrote {}", config_path.display());
    Ok(())
}

fn handle_config(config_path: &std::path::Path, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let cfg = config::load_or_init(config_path)?;
            println!(
                "{}",
                toml::to_string_pretty(&cfg).context("serializing config")?
            );
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", config_path.display());
            Ok(())
        }
        ConfigCommand::Reset => config::write_default_config(config_path),
    }
}

fn handle_token(cfg: &AppConfig, cmd: TokenCommand) -> Result<()> {
    let auth = AuthState::new(&cfg.jwt_secret);
    let token = auth
        .issue_token(&cmd.username, chrono::Duration::hours(cmd.ttl_hours))
        .map_err(|e| anyhow!("minting token: {e}"))?;
    println!("{token}");
    Ok(())
}

async fn handle_serve(cfg: AppConfig, config_path: PathBuf, cmd: ServeCommand) -> Result<()> {
    let port = cmd.port.unwrap_or(cfg.port);

    let auth = AuthState::new(&cfg.jwt_secret);

    let encoding = match h264::detect_hardware_encoder() {
        Some(encoder) => {
            info!("hardware encoder detected: {encoder}");
            Encoding::H264
        }
        None => {
            info!("no hardware encoder, using JPEG software encoding");
            Encoding::Jpeg
        }
    };

    let hub = Arc::new(Hub::new());
    tokio::spawn(hub.clone().run());

    let frames: Arc<dyn FrameSource> = Arc::new(ScreenCapturer::new());
    let encoder = Arc::new(JpegEncoder::new(cfg.stream.quality));
    let stream = Arc::new(StreamController::new(cfg.stream.fps));

    let backend = EnigoBackend::new().map_err(|e| anyhow!("input backend: {e}"))?;
    let input = Arc::new(Injector::new(Box::new(backend)));

    let chat_hub = hub.clone();
    let chat = Arc::new(ChatLog::new(Some(Arc::new(move |msg: ChatMessage| {
        let wire = WireMessage::ChatMessage {
            id: msg.id,
            sender: msg.sender,
            text: msg.text,
            timestamp: msg.timestamp,
        };
        chat_hub.try_broadcast(Bytes::from(protocol::encode(&wire)));
    }))));

    let clip_hub = hub.clone();
    let clipboard_backend =
        Arc::new(SystemClipboard::new().map_err(|e| anyhow!("clipboard backend: {e}"))?);
    let clipboard = Arc::new(ClipboardBridge::new(
        clipboard_backend,
        Arc::new(move |text: String| {
            let wire = WireMessage::ClipboardSync { text };
            clip_hub.try_broadcast(Bytes::from(protocol::encode(&wire)));
        }),
    ));
    clipboard.start_watching();

    let terminals = Arc::new(Registry::new());

    let state = AppState::new(
        hub,
        frames,
        encoder,
        stream,
        input,
        terminals.clone(),
        clipboard.clone(),
        chat,
        auth,
        encoding,
    );
    let router = create_router(state);

    let config_dir = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let (cert_path, key_path) = tls::ensure_tls_material(
        &config_dir,
        cfg.tls.cert.as_deref().map(std::path::Path::new),
        cfg.tls.key.as_deref().map(std::path::Path::new),
    )?;
    let rustls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
        .await
        .context("loading TLS material")?;

    let handle = axum_server::Handle::new();
    {
        let handle = handle.clone();
        let clipboard = clipboard.clone();
        let terminals = terminals.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutting down");
                clipboard.stop();
                terminals.close_all();
                handle.graceful_shutdown(Some(Duration::from_secs(5)));
            }
        });
    }

    let addr: SocketAddr = format!("{}:{port}", cmd.host)
        .parse()
        .context("parsing bind address")?;
    info!("hostlink server starting on https://{addr}");

    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}
