use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use concentrator::config::{Settings, config_path};
use concentrator::transport::{LineTransport, Scheme, Transport, WebSocketTransport};
use concentrator::{ClientBuilder, Message, WILDCARD};
use jiff::Zoned;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "concentrator")]
#[command(about = "Send and receive concentrator bus messages from the command line")]
#[command(version)]
struct Cli {
    /// Node id used as FROM (overrides config and CONCENTRATOR_NODE)
    #[arg(long, global = true)]
    node: Option<String>,

    /// Concentrator address: ws://, wss://, tcp:// or unix://
    #[arg(long, global = true)]
    url: Option<String>,

    /// Config file (default: ~/.config/concentrator/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seconds between reconnect attempts (0 = never reconnect)
    #[arg(long, global = true)]
    reconnect: Option<u64>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and exit
    Send {
        to: String,
        verb: String,
        noun: String,
        args: Vec<String>,
    },

    /// Send an already-encoded wire line and exit
    Raw { wire: String },

    /// Print every incoming message until Ctrl-C
    Listen {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Answer every incoming message with OK:<NOUN> until Ctrl-C
    Ack,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn print_message(msg: &Message, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{} {}", Zoned::now().strftime("%H:%M:%S"), msg.raw);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(msg)?);
        }
    }
    Ok(())
}

async fn run<T: Transport>(builder: ClientBuilder<T>, command: Commands) -> Result<()> {
    let client = builder.build();

    match command {
        Commands::Send {
            to,
            verb,
            noun,
            args,
        } => {
            client.connect().await?;
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            client
                .send(&to, &verb, &noun, &args)
                .await
                .context("Failed to send message")?;
        }

        Commands::Raw { wire } => {
            client.connect().await?;
            client
                .send_raw(&wire)
                .await
                .context("Failed to send message")?;
        }

        Commands::Listen { format } => {
            let Some(inbox) = client.inbox().cloned() else {
                bail!("listen needs inbox_capacity > 0");
            };
            client.connect().await?;

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    msg = inbox.recv() => match msg {
                        Some(msg) => print_message(&msg, format)?,
                        None => break,
                    },
                }
            }
        }

        Commands::Ack => {
            client.handle(WILDCARD, |req| async move {
                let args: Vec<&str> = req.msg.args.iter().map(String::as_str).collect();
                if let Err(e) = req.reply("OK", &req.msg.noun, &args).await {
                    log::warn!("failed to ack {}: {}", req.msg.raw, e);
                }
            });
            client.connect().await?;

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    client.close().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        node,
        url,
        config,
        reconnect,
        log_file,
        command,
    } = Cli::parse();

    // Logging needs log_file from the settings, so report load errors once
    // the logger is up.
    let path = config.or_else(config_path);
    let (mut settings, load_error) = match path.as_deref().map(Settings::read_from) {
        Some(Ok(Some(settings))) => (settings, None),
        Some(Ok(None)) | None => (Settings::default(), None),
        Some(Err(e)) => (Settings::default(), Some(e)),
    };
    settings.apply_env();

    if let Some(node) = node {
        settings.node = node;
    }
    if let Some(url) = url {
        settings.url = url;
    }
    if let Some(secs) = reconnect {
        settings.reconnect_interval_secs = secs;
    }
    if log_file.is_some() {
        settings.log_file = log_file;
    }

    init_logging(settings.log_file.as_deref())?;
    if let Some(e) = load_error {
        log::warn!("[config] {:#}, using defaults", e);
    }

    match Scheme::of(&settings.url)? {
        Scheme::WebSocket => run(settings.client_builder(WebSocketTransport), command).await,
        Scheme::Tcp | Scheme::Unix => run(settings.client_builder(LineTransport), command).await,
    }
}
