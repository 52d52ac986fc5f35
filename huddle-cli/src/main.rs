use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use huddle::client::{CallConfig, CallDeps, CallEvent, CallSession};
use huddle::server::{CoordinatorConfig, SignalingService};
use huddle::{ParticipantId, RoomId};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Signaling coordinator and headless participant for video calls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the room coordinator.
    Serve {
        #[arg(long, env = "HUDDLE_BIND")]
        bind: Option<SocketAddr>,

        /// Seconds of silence after which a participant is dropped.
        #[arg(long, env = "HUDDLE_PONG_SECS")]
        pong_secs: Option<u64>,

        #[arg(long, env = "HUDDLE_PING_SECS")]
        ping_secs: Option<u64>,
    },

    /// Join a room as a headless participant and print call events.
    Join {
        room: String,

        /// Participant id; a random one is generated when omitted.
        #[arg(long = "as")]
        participant: Option<String>,

        #[arg(long, env = "HUDDLE_SIGNALING_URL")]
        signaling_url: Option<String>,

        #[arg(long, env = "HUDDLE_APPOINTMENT_ID")]
        appointment: Option<String>,

        #[arg(long)]
        audio_only: bool,
    },

    /// Print the resolved configuration.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match Cli::parse().command {
        Commands::Serve {
            bind,
            pong_secs,
            ping_secs,
        } => serve(bind, pong_secs, ping_secs).await,
        Commands::Join {
            room,
            participant,
            signaling_url,
            appointment,
            audio_only,
        } => {
            let mut config = CallConfig::from_env();
            if let Some(url) = signaling_url {
                config.signaling_url = url;
            }
            if appointment.is_some() {
                config.appointment_id = appointment;
            }
            if audio_only {
                config.constraints.video = None;
            }
            let participant = participant
                .map(ParticipantId::from)
                .unwrap_or_else(ParticipantId::generate);
            join(config, RoomId::from(room), participant).await
        }
        Commands::CheckConfig => {
            let coordinator = CoordinatorConfig::from_env();
            let call = CallConfig::from_env();
            println!("{}", "Coordinator".green().bold());
            println!("   bind:        {}", coordinator.bind_addr);
            println!("   ping period: {:?}", coordinator.ping_period);
            println!("   pong wait:   {:?}", coordinator.pong_wait);
            println!("{}", "Participant".green().bold());
            println!("   signaling:   {}", call.signaling_url);
            for server in &call.ice_servers {
                println!("   ice:         {}", server.urls.join(", "));
            }
            if let Some(id) = &call.appointment_id {
                println!("   appointment: {}", id);
            }
            Ok(())
        }
    }
}

async fn serve(bind: Option<SocketAddr>, pong_secs: Option<u64>, ping_secs: Option<u64>) -> Result<()> {
    let mut config = CoordinatorConfig::from_env();
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if let Some(secs) = pong_secs {
        config.pong_wait = Duration::from_secs(secs);
        config.ping_period = config.pong_wait * 9 / 10;
    }
    if let Some(secs) = ping_secs {
        config.ping_period = Duration::from_secs(secs);
    }

    println!("{}", "Starting huddle coordinator...".green().bold());
    println!("   ws://{}/ws/{{room}}/{{participant}}", config.bind_addr);

    SignalingService::new(config).serve().await
}

async fn join(config: CallConfig, room: RoomId, participant: ParticipantId) -> Result<()> {
    println!(
        "{} {} as {}",
        "Joining".cyan().bold(),
        room.to_string().bold(),
        participant.to_string().bold()
    );

    let deps = CallDeps::headless(&config);
    let (session, mut events) = CallSession::new(config, participant, deps);
    session
        .start(room)
        .await
        .context("Failed to start the call")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; leaving the call");
                break;
            }
            event = events.recv() => match event {
                Some(CallEvent::PeerJoined(peer)) => println!("{} {}", "+".green(), peer),
                Some(CallEvent::PeerLeft(peer)) => println!("{} {}", "-".yellow(), peer),
                Some(CallEvent::RemoteStream { peer, stream }) => {
                    println!("{} {} ({} tracks)", "~".cyan(), peer, stream.tracks().len());
                }
                Some(CallEvent::NegotiationFailed { peer, error }) => {
                    println!("{} {}: {}", "!".red(), peer, error);
                }
                Some(CallEvent::Terminated(error)) => {
                    println!("{} {}", "Call terminated:".red().bold(), error);
                    break;
                }
                None => break,
            },
        }
    }

    session.end().await;
    println!("{}", "Left the call".green());
    Ok(())
}
