//! Process configuration.

use crate::protocol::PROTOCOL_VERSION;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "minecraft-idle-proxy",
    about = "Keeps a Minecraft session alive on a server while you are away"
)]
pub struct Config {
    /// Address of the destination server.
    #[arg(long)]
    pub host: String,

    /// Port of the destination server.
    #[arg(long, default_value_t = 25565)]
    pub port: u16,

    /// Protocol version to present to the destination server.
    #[arg(long, default_value_t = PROTOCOL_VERSION)]
    pub protocol: i32,

    /// Mojang account username (an email or legacy name). Only needed
    /// until a session token has been cached.
    #[arg(long)]
    pub username: Option<String>,

    /// Mojang account password.
    #[arg(long)]
    pub password: Option<String>,

    /// Address the local listener binds to.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Port the game client connects to.
    #[arg(long, default_value_t = 1337)]
    pub listen_port: u16,

    /// Seconds to wait before reconnecting after a dropped session.
    #[arg(long, default_value_t = 10)]
    pub reconnect_seconds: u64,

    /// Seconds between idle movements while no client is attached.
    #[arg(long, default_value_t = 30)]
    pub anti_afk_seconds: u64,

    /// Where cached credentials are stored.
    #[arg(long, default_value = "credentials.json")]
    pub credentials_file: PathBuf,
}
