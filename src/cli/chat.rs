//! Line-based interactive conversation

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::cli::RunOptions;
use crate::commands::{process_input, CommandResult};
use crate::core::app::{apply_action, ChatAction, ChatCommand, ChatSession};
use crate::core::conversation::{ConversationEvent, ConversationService};

pub async fn run_chat(options: RunOptions) -> Result<(), Box<dyn Error>> {
    let mut session = options.open_session()?;
    let (service, mut events) = options.conversation_service()?;

    eprintln!(
        "💬 Chatting with {} via {}",
        session.character().display_name,
        options.config.endpoint()
    );
    eprintln!("💡 Type /help for commands, /quit or Ctrl+D to leave");

    if options.config.greeting_enabled() && session.seed_greeting() {
        print_last_reply(&session, &mut io::stdout())?;
    }

    let input = BufReader::new(tokio::io::stdin());
    drive_chat(&mut session, &service, &mut events, input, &mut io::stdout()).await?;
    Ok(())
}

/// Feed input lines into the session and print replies until the input ends
/// or the user quits. A reply that is still pending when the input ends is
/// waited for before returning.
pub async fn drive_chat<R, W>(
    session: &mut ChatSession,
    service: &ConversationService,
    events: &mut mpsc::UnboundedReceiver<(ConversationEvent, u64)>,
    input: R,
    out: &mut W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let character_name = session.character().display_name.clone();
    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    if session.is_loading() {
                        continue;
                    }
                    break;
                };
                match process_input(session, &line) {
                    CommandResult::Quit => break,
                    CommandResult::Notice(text) => writeln!(out, "{text}")?,
                    CommandResult::ProcessAsMessage(text) => {
                        apply_action(session, ChatAction::SetDraft { text });
                        if let Some(ChatCommand::SendRequest { request_id, request }) =
                            apply_action(session, ChatAction::SubmitDraft)
                        {
                            service.spawn_request(request_id, request);
                            writeln!(out, "… {character_name} is typing")?;
                        }
                    }
                }
            }
            Some((event, request_id)) = events.recv() => {
                if session.phase().in_flight_id() != Some(request_id) {
                    continue;
                }
                apply_action(session, ChatAction::from((event, request_id)));
                match session.error() {
                    Some(error) => writeln!(out, "❌ {error}")?,
                    None => print_last_reply(session, out)?,
                }
                if !input_open {
                    break;
                }
            }
        }
        out.flush()?;
    }

    out.flush()
}

fn print_last_reply<W: Write>(session: &ChatSession, out: &mut W) -> io::Result<()> {
    if let Some(message) = session.messages().last().filter(|m| m.is_assistant()) {
        writeln!(out, "{}: {}", session.character().display_name, message.text)?;
    }
    Ok(())
}
