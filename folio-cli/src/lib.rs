//! Terminal client for the portfolio chat relay.

pub mod animation;
pub mod client;
pub mod config;
pub mod cursor;
pub mod decoder;
pub mod links;
pub mod particles;
pub mod persona;
pub mod session;

pub use client::{ClientError, RelayClient, TurnEvent};
pub use config::ClientConfig;
pub use decoder::{StreamDecoder, StreamEvent};
pub use session::{ChatSession, Entry, Sender, TurnState, FALLBACK_REPLY};
