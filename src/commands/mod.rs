mod registry;

pub use registry::{all_commands, CommandInvocation};

use std::path::Path;

use crate::core::app::ChatSession;
use crate::core::attachment::AttachmentFile;

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Notice(String),
    ProcessAsMessage(String),
    Quit,
}

/// Interpret one line of user input. Lines that are not a known slash
/// command are treated as message drafts.
pub fn process_input(session: &mut ChatSession, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, ' ');
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match registry::find_command(command_name) {
        Some(command) => (command.handler)(
            session,
            CommandInvocation { args },
        ),
        None => CommandResult::ProcessAsMessage(input.to_string()),
    }
}

pub(super) fn handle_help(_session: &mut ChatSession, _invocation: CommandInvocation<'_>) -> CommandResult {
    let mut help = String::from("Type a message and press Enter to send it.\n");
    for command in all_commands() {
        help.push_str(&format!("  {:<16} {}\n", command.usage, command.help));
    }
    CommandResult::Notice(help.trim_end().to_string())
}

pub(super) fn handle_attach(session: &mut ChatSession, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        return CommandResult::Notice("Usage: /attach <path>".to_string());
    }

    let selected = AttachmentFile::from_path(Path::new(invocation.args)).and_then(|file| {
        let name = file.name.clone();
        session.select_attachment(file).map(|url| (name, url))
    });
    match selected {
        Ok((name, url)) => CommandResult::Notice(format!("Attached {name} ({url})")),
        Err(e) => CommandResult::Notice(format!("Attachment not added: {e}")),
    }
}

pub(super) fn handle_detach(session: &mut ChatSession, _invocation: CommandInvocation<'_>) -> CommandResult {
    if session.remove_attachment() {
        CommandResult::Notice("Attachment removed".to_string())
    } else {
        CommandResult::Notice("No attachment to remove".to_string())
    }
}

pub(super) fn handle_transcript(session: &mut ChatSession, _invocation: CommandInvocation<'_>) -> CommandResult {
    if session.messages().is_empty() {
        return CommandResult::Notice("(no messages yet)".to_string());
    }
    let speaker = session.character().display_name.clone();
    let lines: Vec<String> = session
        .messages()
        .iter()
        .map(|message| {
            let who = if message.is_user() { "You" } else { speaker.as_str() };
            let mut line = format!("[{}] {who}: {}", message.sent_at.format("%H:%M:%S"), message.text);
            if let Some(image) = &message.image {
                line.push_str(&format!(" [image: {}]", image.name));
            }
            line
        })
        .collect();
    CommandResult::Notice(lines.join("\n"))
}

pub(super) fn handle_status(session: &mut ChatSession, _invocation: CommandInvocation<'_>) -> CommandResult {
    let session_id = session
        .session_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "(unresolved)".to_string());
    let view = session.view_state();
    let request = if view.is_loading {
        "waiting for reply".to_string()
    } else if let Some(error) = &view.error {
        format!("last request failed: {error}")
    } else {
        "idle".to_string()
    };
    let attachment = session
        .attachments()
        .current()
        .map(|file| {
            let preview = session.attachments().preview_url().unwrap_or("no preview");
            format!("{} ({} bytes, {preview})", file.name, file.len())
        })
        .unwrap_or_else(|| "none".to_string());
    CommandResult::Notice(format!(
        "Session: {session_id}\nRequest: {request}\nAttachment: {attachment}\nLog: {}",
        session.logging().get_status_string()
    ))
}

pub(super) fn handle_quit(_session: &mut ChatSession, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
