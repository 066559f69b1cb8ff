pub mod app;
pub mod attachment;
pub mod builtin_characters;
pub mod config;
pub mod conversation;
pub mod guard;
pub mod message;
pub mod session_id;
pub mod transcript;
