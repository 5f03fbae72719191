mod chat;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Handle;

use hookbot::{
    ChatQueue, ClientConfig, ClientEvent, DirStore, GameClient, Identity, MapCache,
    RawGridDecoder, UdpTransport,
};

use chat::OllamaBackend;

#[derive(Parser)]
#[command(name = "hookbot")]
#[command(about = "Headless Teeworlds 0.6 bot")]
struct Args {
    #[arg(short, long, help = "Server address (e.g., 127.0.0.1:8303)")]
    address: String,

    #[arg(long, help = "Player name, overrides the profile")]
    name: Option<String>,

    #[arg(long, help = "Clan tag, overrides the profile")]
    clan: Option<String>,

    #[arg(long, help = "JSON identity profile")]
    profile: Option<PathBuf>,

    #[arg(long, default_value_t = String::new())]
    password: String,

    #[arg(long, help = "Ollama-style generate endpoint for chat replies")]
    chat_endpoint: Option<String>,

    #[arg(long, default_value_t = String::from("llama3"))]
    chat_model: String,

    #[arg(long, default_value_t = String::from("data"))]
    map_dir: String,
}

fn load_identity(args: &Args) -> anyhow::Result<Identity> {
    let mut identity = match &args.profile {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read profile {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse profile {}", path.display()))?
        }
        None => Identity::default(),
    };

    if let Some(name) = &args.name {
        identity.name = name.clone();
    }
    if let Some(clan) = &args.clan {
        identity.clan = clan.clone();
    }
    Ok(identity)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ClientConfig {
        identity: load_identity(&args)?,
        password: args.password.clone(),
        ..ClientConfig::default()
    };

    let addr = UdpTransport::resolve(&args.address)
        .with_context(|| format!("failed to resolve {}", args.address))?;
    let transport = UdpTransport::bind("0.0.0.0:0").context("failed to bind UDP socket")?;
    let maps = MapCache::new(DirStore::new(&args.map_dir), RawGridDecoder);

    let mut client = GameClient::new(config.clone(), transport, maps);

    if let Some(endpoint) = &args.chat_endpoint {
        log::info!("Chat replies via {} ({})", endpoint, args.chat_model);
        client.set_chat_queue(ChatQueue::spawn(
            &Handle::current(),
            OllamaBackend::new(endpoint, &args.chat_model),
            config.chat_queue_capacity,
            config.chat_policy(),
        ));
    }

    let shutdown = client.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, disconnecting");
            shutdown.store(true, Ordering::Release);
        }
    });

    client
        .connect(addr)
        .with_context(|| format!("failed to connect to {}", addr))?;

    tokio::task::spawn_blocking(move || {
        client.run_with(|event| match event {
            ClientEvent::Disconnected { reason } => {
                log::info!("Disconnected: {}", reason.as_str());
            }
            ClientEvent::Online { game_tick } => log::info!("Online at tick {}", game_tick),
            _ => {}
        });
    })
    .await
    .context("client loop panicked")?;

    Ok(())
}
