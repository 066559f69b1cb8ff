//! The conversation session: transcript, draft, pending attachment and the
//! request lifecycle, owned by whichever driver runs the conversation.

mod actions;
mod request;

#[cfg(test)]
mod tests;

pub use actions::{apply_action, ChatAction, ChatCommand};
pub use request::{RequestPhase, ViewState};

use tracing::{debug, warn};

use crate::core::attachment::{AttachmentError, AttachmentFile, AttachmentManager};
use crate::core::builtin_characters::Character;
use crate::core::conversation::ConversationRequest;
use crate::core::guard::{GuardInput, SubmissionGuard};
use crate::core::message::{Message, NewMessage, TranscriptRole};
use crate::core::session_id::{SessionId, SessionIdentity, SessionStorage};
use crate::core::transcript::Transcript;
use crate::utils::logging::LoggingState;

const USER_DISPLAY_NAME: &str = "You";

/// A request accepted by [`ChatSession::submit`], ready for the client.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request_id: u64,
    pub request: ConversationRequest,
}

pub struct ChatSession {
    session_id: Option<SessionId>,
    character: Character,
    draft: String,
    attachments: AttachmentManager,
    transcript: Transcript,
    phase: RequestPhase,
    next_request_id: u64,
    logging: LoggingState,
}

impl ChatSession {
    /// Start a session scope, resolving (or creating) its id from `storage`.
    pub fn open(
        storage: &dyn SessionStorage,
        character: Character,
        attachments: AttachmentManager,
    ) -> Self {
        let session_id = SessionIdentity::get_or_create(storage);
        Self::new(Some(session_id), character, attachments)
    }

    pub fn new(
        session_id: Option<SessionId>,
        character: Character,
        attachments: AttachmentManager,
    ) -> Self {
        Self {
            session_id,
            character,
            draft: String::new(),
            attachments,
            transcript: Transcript::new(),
            phase: RequestPhase::Idle,
            next_request_id: 0,
            logging: LoggingState::disabled(),
        }
    }

    pub fn with_logging(mut self, logging: LoggingState) -> Self {
        self.logging = logging;
        self
    }

    pub fn logging(&self) -> &LoggingState {
        &self.logging
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    /// Select an image; returns the preview URL of the new attachment.
    pub fn select_attachment(&mut self, file: AttachmentFile) -> Result<String, AttachmentError> {
        self.attachments
            .select(file)
            .map(|preview| preview.url().to_string())
    }

    pub fn remove_attachment(&mut self) -> bool {
        self.attachments.remove()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.snapshot()
    }

    pub fn phase(&self) -> &RequestPhase {
        &self.phase
    }

    pub fn view_state(&self) -> ViewState {
        ViewState::from(&self.phase)
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_in_flight()
    }

    pub fn error(&self) -> Option<&str> {
        self.phase.error()
    }

    /// Show the character's greeting as the opening message. Does nothing once
    /// the conversation has started.
    pub fn seed_greeting(&mut self) -> bool {
        if !self.transcript.is_empty() {
            return false;
        }
        let Some(greeting) = self.character.greeting.clone() else {
            return false;
        };
        self.append(NewMessage::assistant(greeting));
        true
    }

    /// Try to send the current draft and attachment.
    ///
    /// Rejections are silent and leave every piece of state untouched. On
    /// acceptance the user message is echoed into the transcript immediately,
    /// the draft and attachment are cleared and the session enters `Sending`.
    pub fn submit(&mut self) -> Option<PendingRequest> {
        SubmissionGuard::check(&GuardInput {
            session_id: self.session_id.as_ref().map(SessionId::as_str),
            draft: &self.draft,
            has_attachment: self.attachments.is_present(),
            in_flight: self.phase.is_in_flight(),
        })
        .ok()?;
        let session_id = self.session_id.clone()?;

        let text = self.draft.trim().to_string();
        let image = self.attachments.image_ref();
        self.append(NewMessage::user(text.clone(), image.clone()));
        self.draft.clear();
        self.attachments.clear();

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.phase = RequestPhase::Sending { request_id };
        debug!(request_id, "Submission accepted");

        Some(PendingRequest {
            request_id,
            request: ConversationRequest {
                session_id,
                text,
                image,
            },
        })
    }

    /// Resolve the in-flight request with the assistant's reply. Returns
    /// `false` for replies to anything other than the current request.
    pub fn deliver(&mut self, request_id: u64, text: impl Into<String>) -> bool {
        if self.phase.in_flight_id() != Some(request_id) {
            debug!(request_id, "Ignoring reply for a request that is not in flight");
            return false;
        }
        self.append(NewMessage::assistant(text));
        self.phase = RequestPhase::Delivered { request_id };
        true
    }

    /// Resolve the in-flight request as failed. The user's message stays in
    /// the transcript.
    pub fn fail(&mut self, request_id: u64, error: impl Into<String>) -> bool {
        if self.phase.in_flight_id() != Some(request_id) {
            debug!(request_id, "Ignoring failure for a request that is not in flight");
            return false;
        }
        self.phase = RequestPhase::Failed {
            request_id,
            error: error.into(),
        };
        true
    }

    fn append(&mut self, message: NewMessage) {
        let speaker = match message.role {
            TranscriptRole::User => USER_DISPLAY_NAME,
            TranscriptRole::Assistant => self.character.display_name.as_str(),
        };
        let appended = self.transcript.append(message);
        if let Err(e) = self.logging.log_message(appended, speaker) {
            warn!(error = %e, "Failed to log message");
        }
    }
}
