//! Transparent Minecraft proxy that keeps a session alive on a remote
//! server while no game client is attached ("idling"), then resumes
//! forwarding traffic when a client reconnects.
//!
//! The proxied connection looks like this:
//! Minecraft client => this proxy (fake server) => destination server
//!
//! The proxy logs into the destination server itself, performing the full
//! encryption and compression handshake, and from then on consumes the
//! clientbound packet stream into a [`game_state::GameState`] snapshot.
//! When a client connects to the local listen port, the proxy plays the
//! server's role in a second login handshake, replays the snapshot as a
//! synthetic world-join burst, and attaches the client to the live relay.
//! While no client is attached, a watchdog sends periodic idle movements
//! so the destination server does not kick the session for inactivity.

pub mod anti_afk;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod downstream;
pub mod game_state;
pub mod protocol;
pub mod send_queue;
pub mod session;
pub mod transport;
pub mod upstream;
