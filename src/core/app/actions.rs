use tracing::warn;

use super::ChatSession;
use crate::core::attachment::AttachmentFile;
use crate::core::conversation::{ConversationEvent, ConversationRequest};

pub enum ChatAction {
    SetDraft { text: String },
    SelectAttachment { file: AttachmentFile },
    RemoveAttachment,
    SubmitDraft,
    ResponseDelivered { request_id: u64, text: String },
    ResponseFailed { request_id: u64, error: String },
}

impl From<(ConversationEvent, u64)> for ChatAction {
    fn from((event, request_id): (ConversationEvent, u64)) -> Self {
        match event {
            ConversationEvent::Delivered(text) => ChatAction::ResponseDelivered { request_id, text },
            ConversationEvent::Failed(error) => ChatAction::ResponseFailed { request_id, error },
        }
    }
}

/// Side effects the driver must perform after an action.
#[derive(Debug)]
pub enum ChatCommand {
    SendRequest {
        request_id: u64,
        request: ConversationRequest,
    },
}

pub fn apply_action(session: &mut ChatSession, action: ChatAction) -> Option<ChatCommand> {
    match action {
        ChatAction::SetDraft { text } => {
            session.set_draft(text);
            None
        }
        ChatAction::SelectAttachment { file } => {
            if let Err(e) = session.select_attachment(file) {
                warn!(error = %e, "Attachment rejected");
            }
            None
        }
        ChatAction::RemoveAttachment => {
            session.remove_attachment();
            None
        }
        ChatAction::SubmitDraft => session.submit().map(|pending| ChatCommand::SendRequest {
            request_id: pending.request_id,
            request: pending.request,
        }),
        ChatAction::ResponseDelivered { request_id, text } => {
            session.deliver(request_id, text);
            None
        }
        ChatAction::ResponseFailed { request_id, error } => {
            session.fail(request_id, error);
            None
        }
    }
}
