use chrono::Utc;

use crate::core::message::{Message, MessageId, NewMessage};

/// Ordered, append-only record of a conversation.
///
/// Insertion order is display order. Nothing here edits or removes an entry
/// once it has been appended.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_seq: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: NewMessage) -> &Message {
        self.next_seq += 1;
        self.messages.push(Message {
            id: MessageId::from_sequence(self.next_seq),
            role: message.role,
            text: message.text,
            image: message.image,
            sent_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Read-only view for rendering.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
