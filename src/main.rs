use std::time::Duration;

use anyhow::{bail, Context};
use tracing::info;

use cuelink::config;
use cuelink::debug;
use cuelink::game::{player_color, GameSession};
use cuelink::network::{start_session, LoopbackNetwork, ManagerConfig};

// Upper bound for each demo step; the loopback network answers immediately
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Options {
    debug: bool,
    copy_id: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args);

    let config = config::load_config().context("failed to load configuration")?;
    debug::init(options.debug || config.logging.debug, &config.logging.log_file)
        .context("failed to initialize logging")?;
    info!(?options, "Cuelink starting");

    let network = LoopbackNetwork::new().with_id_length(config.session.id_length);
    let manager_config = config.session.manager_config();

    let mut host = open_session(&network, manager_config.clone()).await?;
    let mut guest = open_session(&network, manager_config).await?;
    println!("Hosting game {}", host.session_id());
    if options.copy_id {
        host.copy_session_id();
    }

    guest.join(host.session_id().clone())?;
    run_step("waiting for the table", async {
        while guest.state_syncs_received() == 0 {
            pump_both(&mut host, &mut guest).await?;
        }
        Ok::<_, anyhow::Error>(())
    })
    .await?;

    guest.send_chat("good luck")?;
    host.send_chat("have fun")?;
    run_step("exchanging chat", async {
        while host.chat().len() < 2 || guest.chat().len() < 2 {
            pump_both(&mut host, &mut guest).await?;
        }
        Ok::<_, anyhow::Error>(())
    })
    .await?;

    guest.leave()?;
    run_step("closing the session", async {
        while host.pump().await {}
        Ok::<_, anyhow::Error>(())
    })
    .await?;

    print_session("Host", &host);
    print_session("Guest", &guest);
    Ok(())
}

async fn open_session(network: &LoopbackNetwork, config: ManagerConfig) -> anyhow::Result<GameSession> {
    let (transport, events) = network.endpoint();
    let client = start_session(transport, events, config)
        .await
        .context("failed to start session")?;
    Ok(GameSession::new(client))
}

/// Apply whichever session event arrives first
async fn pump_both(host: &mut GameSession, guest: &mut GameSession) -> anyhow::Result<()> {
    tokio::select! {
        alive = host.pump() => if !alive { bail!("host session ended early") },
        alive = guest.pump() => if !alive { bail!("guest session ended early") },
    }
    Ok(())
}

async fn run_step<F>(name: &str, step: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    info!(step = name, "demo step");
    tokio::time::timeout(STEP_TIMEOUT, step)
        .await
        .with_context(|| format!("timed out {}", name))?
}

fn print_session(label: &str, game: &GameSession) {
    match game.my_player_number() {
        Some(player) => println!("{} (Player {}, {}):", label, player, player_color(player)),
        None => println!("{}:", label),
    }
    for line in game.log() {
        println!("  {}", line);
    }
    for chat in game.chat() {
        let from = if chat.from_self { "me" } else { "opponent" };
        println!("  [{}] {}", from, chat.text);
    }
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> Options {
    let mut options = Options::default();
    let program = args.first().map(String::as_str).unwrap_or("cuelink");

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--debug" | "-d" => options.debug = true,
            "--copy-id" => options.copy_id = true,
            "--help" | "-h" => {
                print_usage(program);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", arg);
                print_usage(program);
                std::process::exit(1);
            }
        }
    }

    options
}

fn print_usage(program: &str) {
    println!("Cuelink - two-player pool over a peer-to-peer session");
    println!();
    println!("Usage:");
    println!("  {}                # Host and join a game over the in-process network", program);
    println!("  {} --debug        # Also write a debug log (see config.toml)", program);
    println!("  {} --copy-id      # Copy the host's game id to the clipboard", program);
    println!();
    println!("Config file: {}", config::get_config_path().display());
}
