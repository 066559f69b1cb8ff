//! Chatterbox is a terminal client for talking to a single remote chat character.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation session: the persisted session id, the
//!   pending image attachment and its preview handle, the append-only
//!   transcript, the submission guard, and the remote conversation client.
//! - [`commands`] implements slash-command parsing used by the chat loop.
//! - [`utils`] holds diagnostics setup and transcript logging.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which loads configuration and dispatches into
//! [`core::app`] for interactive sessions.

pub mod cli;
pub mod commands;
pub mod core;
pub mod utils;
