//! TUI-less "say" command

use std::error::Error;
use std::path::PathBuf;

use crate::cli::RunOptions;
use crate::core::app::{apply_action, ChatAction};
use crate::core::attachment::AttachmentFile;

pub async fn run_say(
    options: RunOptions,
    text: Vec<String>,
    image: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let mut session = options.open_session()?;

    if let Some(path) = image {
        session.select_attachment(AttachmentFile::from_path(&path)?)?;
    }
    session.set_draft(text.join(" "));

    let Some(pending) = session.submit() else {
        eprintln!("Usage: chatterbox say [--image <PATH>] <message>");
        std::process::exit(1);
    };

    let (service, mut events) = options.conversation_service()?;
    service.spawn_request(pending.request_id, pending.request);

    let event = events
        .recv()
        .await
        .ok_or("conversation service stopped before replying")?;
    apply_action(&mut session, ChatAction::from(event));

    if let Some(error) = session.error() {
        eprintln!("❌ Error: {error}");
        std::process::exit(1);
    }
    if let Some(reply) = session.messages().last().filter(|m| m.is_assistant()) {
        println!("{}", reply.text);
    }

    Ok(())
}
