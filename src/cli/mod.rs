//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod character_list;
pub mod chat;
pub mod say;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::character_list::list_characters;
use crate::cli::chat::run_chat;
use crate::cli::say::run_say;
use crate::core::app::ChatSession;
use crate::core::attachment::{AttachmentManager, PreviewRegistry};
use crate::core::builtin_characters::resolve_character;
use crate::core::config::{path_display, Config};
use crate::core::conversation::{ConversationEvent, ConversationService, HttpBackend};
use crate::core::session_id::{FileSessionStorage, MemorySessionStorage, SessionStorage};
use crate::utils::logging::{init_tracing, LoggingState};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "chatterbox")]
#[command(about = "Chat with a remote character from your terminal")]
#[command(
    long_about = "Chatterbox connects to a character chat service over HTTP. Each run gets \
its own session id, kept for as long as the process lives, so the service can keep its side of \
the conversation. Pass --session-file to keep an id across runs.\n\n\
Controls:\n\
  Type              Enter your message\n\
  Enter             Send the message (ignored while a reply is pending)\n\
  /attach <path>    Attach an image to the next message\n\
  /detach           Remove the pending image\n\
  /help             Show all commands\n\
  /quit             Leave (Ctrl+D works too)\n\n\
Environment Variables:\n\
  RUST_LOG          Diagnostic log level written to stderr (default: warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Chat endpoint URL (overrides the configured endpoint)
    #[arg(short = 'e', long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Append the transcript to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Keep the session id in this file so later runs reuse it
    #[arg(long, global = true, value_name = "FILE")]
    pub session_file: Option<PathBuf>,

    /// Character to talk to
    #[arg(short = 'c', long, global = true, value_name = "ID")]
    pub character: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive conversation (default)
    Chat,
    /// Send one message and print the reply
    Say {
        /// Image to send along with the message
        #[arg(short = 'i', long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Message text
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// List built-in characters
    Characters,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

/// Settings shared by the chat and say commands after merging flags over config.
pub struct RunOptions {
    pub config: Config,
    pub log: Option<PathBuf>,
    pub session_file: Option<PathBuf>,
}

impl RunOptions {
    /// Session id storage for this process. The id lives as long as the
    /// process unless `--session-file` names a file to keep it in.
    pub fn session_storage(&self) -> Box<dyn SessionStorage> {
        match &self.session_file {
            Some(path) => Box::new(FileSessionStorage::new(path)),
            None => Box::new(MemorySessionStorage::new()),
        }
    }

    /// Open the conversation session for this terminal.
    pub fn open_session(&self) -> Result<ChatSession, Box<dyn Error>> {
        let storage = self.session_storage();
        let character = resolve_character(self.config.character.as_deref());
        let attachments =
            AttachmentManager::new(PreviewRegistry::new(), self.config.max_attachment_bytes());
        let logging = LoggingState::new(self.log.clone())?;
        Ok(ChatSession::open(storage.as_ref(), character, attachments).with_logging(logging))
    }

    pub fn conversation_service(
        &self,
    ) -> Result<(ConversationService, mpsc::UnboundedReceiver<(ConversationEvent, u64)>), Box<dyn Error>>
    {
        let backend = HttpBackend::new(self.config.endpoint(), self.config.request_timeout())?;
        Ok(ConversationService::new(Arc::new(backend)))
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {e}");
    }
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Characters => {
            list_characters();
            Ok(())
        }
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            let Some(key) = key else {
                config.print_all();
                return Ok(());
            };
            let value = value.join(" ");
            match config.set_value(&key, &value) {
                Ok(()) => {
                    config.save()?;
                    println!("✅ Set {key} to: {value}");
                    Ok(())
                }
                Err(message) => {
                    eprintln!("❌ {message}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            match config.unset_value(&key) {
                Ok(()) => {
                    config.save()?;
                    println!("✅ Unset {key}");
                    println!("Config: {}", path_display(Config::config_path()?));
                    Ok(())
                }
                Err(message) => {
                    eprintln!("❌ {message}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Chat => {
            let options = resolve_options(args.endpoint, args.character, args.log, args.session_file)?;
            run_chat(options).await
        }
        Commands::Say { image, text } => {
            let options = resolve_options(args.endpoint, args.character, args.log, args.session_file)?;
            run_say(options, text, image).await
        }
    }
}

fn resolve_options(
    endpoint: Option<String>,
    character: Option<String>,
    log: Option<PathBuf>,
    session_file: Option<PathBuf>,
) -> Result<RunOptions, Box<dyn Error>> {
    let mut config = Config::load()?;
    if let Some(endpoint) = endpoint {
        config.set_value("endpoint", &endpoint)?;
    }
    if let Some(character) = character {
        config.character = Some(character);
    }
    Ok(RunOptions {
        config,
        log,
        session_file,
    })
}
