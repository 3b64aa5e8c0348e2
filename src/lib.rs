//! hostlink: a self-hosted remote-desktop and administration server.
//!
//! One binary exposes the host's screen, input, shell, clipboard and a
//! chat channel to browser clients over a TLS-terminated HTTP/WebSocket
//! endpoint. The heart of the crate is the session hub in [`ws::hub`],
//! which fans screen frames out to clients, arbitrates the single
//! input-controller, and routes every inbound control message.

pub mod api;
pub mod auth;
pub mod capture;
pub mod chat;
pub mod clipboard;
pub mod config;
pub mod input;
pub mod stream;
pub mod terminal;
pub mod tls;
pub mod ws;
