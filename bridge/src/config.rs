use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

/// Layered configuration: built-in defaults, an optional TOML file, process
/// environment, then CLI flags — each layer overriding the last.
#[derive(Parser, Debug)]
#[command(name = "bridge")]
pub struct Args {
    #[arg(long, help = "optional TOML config file, layered under env/CLI")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "address to listen on")]
    pub address: Option<String>,

    #[arg(short, long, help = "port to listen on")]
    pub port: Option<u16>,

    #[arg(long, help = "AI provider realtime WebSocket URL")]
    pub ai_ws_url: Option<String>,

    #[arg(long, help = "path to a file containing the AI provider bearer token")]
    pub token_file: Option<PathBuf>,

    #[arg(long, help = "directory to write call recordings into")]
    pub recorder_dir: Option<PathBuf>,

    #[arg(long, help = "disable the recorder even if the feature is compiled in")]
    pub no_record: bool,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    address: Option<String>,
    port: Option<u16>,
    ai_ws_url: Option<String>,
    token_file: Option<PathBuf>,
    recorder_dir: Option<PathBuf>,
    no_record: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub address: SocketAddr,
    pub ai_ws_url: String,
    pub ai_token: Option<String>,
    pub recorder_dir: Option<PathBuf>,
    pub record_enabled: bool,
}

const DEFAULT_ADDRESS: &str = "[::]";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_AI_WS_URL: &str = "wss://api.openai.com/v1/realtime";

impl BridgeConfig {
    /// Resolve defaults -> optional TOML file -> environment -> CLI flags.
    pub fn load(args: Args) -> Result<Self> {
        let file_config = match &args.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let address = args
            .address
            .or_else(|| std::env::var("BRIDGE_ADDRESS").ok())
            .or(file_config.address)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        let port = args
            .port
            .or_else(|| std::env::var("BRIDGE_PORT").ok().and_then(|s| s.parse().ok()))
            .or(file_config.port)
            .unwrap_or(DEFAULT_PORT);

        let ai_ws_url = args
            .ai_ws_url
            .or_else(|| std::env::var("BRIDGE_AI_WS_URL").ok())
            .or(file_config.ai_ws_url)
            .unwrap_or_else(|| DEFAULT_AI_WS_URL.to_string());

        let token_file = args
            .token_file
            .or_else(|| std::env::var("BRIDGE_TOKEN_FILE").ok().map(PathBuf::from))
            .or(file_config.token_file);

        let ai_token = match token_file {
            Some(path) => Some(
                std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .with_context(|| format!("reading token file {}", path.display()))?,
            ),
            None => None,
        };

        let recorder_dir = args.recorder_dir.or(file_config.recorder_dir);
        let no_record = args.no_record || file_config.no_record.unwrap_or(false);

        let address: SocketAddr = format!("{address}:{port}")
            .parse()
            .with_context(|| format!("parsing listen address {address}:{port}"))?;

        Ok(Self {
            address,
            ai_ws_url,
            ai_token,
            record_enabled: !no_record && recorder_dir.is_some(),
            recorder_dir,
        })
    }
}
