use super::*;
use crate::core::attachment::{PreviewRegistry, DEFAULT_MAX_ATTACHMENT_BYTES};
use crate::core::builtin_characters::default_character;
use crate::core::conversation::{
    ConversationBackend, ConversationEvent, ConversationService, RequestError,
};
use crate::core::session_id::MemorySessionStorage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const REPLY: &str = "Could I BE any more ready to chat?";

fn create_test_session() -> ChatSession {
    ChatSession::open(
        &MemorySessionStorage::new(),
        default_character(),
        AttachmentManager::new(PreviewRegistry::new(), DEFAULT_MAX_ATTACHMENT_BYTES),
    )
}

fn png(name: &str) -> AttachmentFile {
    AttachmentFile::new(name, "image/png", vec![1, 2, 3])
}

fn roles_and_texts(session: &ChatSession) -> Vec<(TranscriptRole, String)> {
    session
        .messages()
        .iter()
        .map(|m| (m.role, m.text.clone()))
        .collect()
}

#[test]
fn submit_then_deliver_follows_the_happy_path() {
    let mut session = create_test_session();
    session.set_draft("Hi");

    let pending = session.submit().expect("submission accepted");
    assert_eq!(
        roles_and_texts(&session),
        vec![(TranscriptRole::User, "Hi".to_string())]
    );
    assert!(session.is_loading());
    assert_eq!(session.view_state().error, None);
    assert_eq!(pending.request.text, "Hi");
    assert_eq!(
        Some(&pending.request.session_id),
        session.session_id()
    );

    assert!(session.deliver(pending.request_id, REPLY));
    assert_eq!(
        roles_and_texts(&session),
        vec![
            (TranscriptRole::User, "Hi".to_string()),
            (TranscriptRole::Assistant, REPLY.to_string()),
        ]
    );
    assert!(!session.is_loading());
    assert_eq!(
        session.phase(),
        &RequestPhase::Delivered {
            request_id: pending.request_id
        }
    );
}

#[test]
fn submit_trims_draft_and_clears_it() {
    let mut session = create_test_session();
    session.set_draft("  hello there \n");

    let pending = session.submit().expect("accepted");

    assert_eq!(pending.request.text, "hello there");
    assert_eq!(session.messages()[0].text, "hello there");
    assert_eq!(session.draft(), "");
}

#[test]
fn submit_while_in_flight_is_a_silent_no_op() {
    let mut session = create_test_session();
    session.set_draft("first");
    let pending = session.submit().expect("accepted");

    session.set_draft("second");
    assert!(session.submit().is_none());
    assert!(session.submit().is_none());

    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.draft(), "second");
    assert_eq!(session.view_state().error, None);
    assert_eq!(session.phase().in_flight_id(), Some(pending.request_id));
}

#[test]
fn empty_submission_changes_nothing() {
    let mut session = create_test_session();
    session.set_draft("   ");

    assert!(session.submit().is_none());

    assert!(session.messages().is_empty());
    assert!(!session.is_loading());
    assert_eq!(session.phase(), &RequestPhase::Idle);
    assert_eq!(session.draft(), "   ");
}

#[test]
fn unresolved_session_blocks_submission() {
    let mut session = ChatSession::new(
        None,
        default_character(),
        AttachmentManager::new(PreviewRegistry::new(), DEFAULT_MAX_ATTACHMENT_BYTES),
    );
    session.set_draft("Hi");

    assert!(session.submit().is_none());
    assert!(session.messages().is_empty());
    assert!(!session.is_loading());
}

#[test]
fn failure_keeps_user_message_and_next_submission_clears_error() {
    let mut session = create_test_session();
    session.set_draft("Hi");
    let first = session.submit().expect("accepted");

    assert!(session.fail(first.request_id, "The chat service returned HTTP 502"));
    assert_eq!(session.messages().len(), 1);
    assert!(session.messages()[0].is_user());
    assert_eq!(
        session.view_state(),
        ViewState {
            is_loading: false,
            error: Some("The chat service returned HTTP 502".into())
        }
    );

    session.set_draft("Hi again");
    let second = session.submit().expect("accepted after failure");
    assert_eq!(session.error(), None);
    assert!(session.is_loading());

    assert!(session.deliver(second.request_id, REPLY));
    assert_eq!(
        roles_and_texts(&session),
        vec![
            (TranscriptRole::User, "Hi".to_string()),
            (TranscriptRole::User, "Hi again".to_string()),
            (TranscriptRole::Assistant, REPLY.to_string()),
        ]
    );
    assert_eq!(session.error(), None);
}

#[test]
fn stale_outcomes_are_ignored() {
    let mut session = create_test_session();
    session.set_draft("one");
    let first = session.submit().expect("accepted");
    session.deliver(first.request_id, "reply one");

    session.set_draft("two");
    let second = session.submit().expect("accepted");

    assert!(!session.deliver(first.request_id, "late duplicate"));
    assert!(!session.fail(first.request_id, "late failure"));
    assert!(session.is_loading());
    assert_eq!(session.messages().len(), 3);

    assert!(session.deliver(second.request_id, "reply two"));
    assert!(!session.deliver(second.request_id, "again"));
    assert_eq!(session.messages().len(), 4);
}

#[test]
fn attachment_only_submission_echoes_image_and_clears_attachment() {
    let mut session = create_test_session();
    let registry = session.attachments().registry().clone();
    let url = session.select_attachment(png("cat.png")).expect("selected");
    assert!(url.starts_with("blob:chatterbox/"));

    let pending = session.submit().expect("attachment alone is enough");

    let echoed = &session.messages()[0];
    assert_eq!(echoed.text, "");
    assert_eq!(echoed.image.as_ref().map(|i| i.name.as_str()), Some("cat.png"));
    assert_eq!(
        pending.request.image.as_ref().map(|i| &i.bytes[..]),
        Some(&[1_u8, 2, 3][..])
    );
    assert!(!session.attachments().is_present());
    assert_eq!(registry.allocated(), 1);
    assert_eq!(registry.released(), 1);
}

#[test]
fn rejected_submission_keeps_the_attachment() {
    let mut session = create_test_session();
    session.set_draft("first");
    session.submit().expect("accepted");

    session.select_attachment(png("later.png")).expect("selected");
    assert!(session.submit().is_none());

    assert!(session.attachments().is_present());
    assert_eq!(session.attachments().registry().live(), 1);
}

#[test]
fn dropping_the_session_releases_the_pending_preview() {
    let registry = PreviewRegistry::new();
    {
        let mut session = ChatSession::open(
            &MemorySessionStorage::new(),
            default_character(),
            AttachmentManager::new(registry.clone(), DEFAULT_MAX_ATTACHMENT_BYTES),
        );
        session.select_attachment(png("a.png")).unwrap();
        session.select_attachment(png("b.png")).unwrap();
    }
    assert_eq!(registry.allocated(), 2);
    assert_eq!(registry.released(), 2);
    assert_eq!(registry.live(), 0);
}

#[test]
fn reopening_with_same_storage_keeps_session_id() {
    let storage = MemorySessionStorage::new();
    let registry = PreviewRegistry::new();
    let first = ChatSession::open(
        &storage,
        default_character(),
        AttachmentManager::new(registry.clone(), DEFAULT_MAX_ATTACHMENT_BYTES),
    );
    let second = ChatSession::open(
        &storage,
        default_character(),
        AttachmentManager::new(registry, DEFAULT_MAX_ATTACHMENT_BYTES),
    );
    assert_eq!(first.session_id(), second.session_id());
}

#[test]
fn greeting_is_only_seeded_into_an_empty_transcript() {
    let mut session = create_test_session();
    assert!(session.seed_greeting());
    assert!(!session.seed_greeting());
    assert_eq!(
        roles_and_texts(&session),
        vec![(TranscriptRole::Assistant, REPLY.to_string())]
    );
}

#[test]
fn actions_drive_the_same_lifecycle() {
    let mut session = create_test_session();
    assert!(apply_action(
        &mut session,
        ChatAction::SetDraft {
            text: "Hi".into()
        }
    )
    .is_none());

    let command = apply_action(&mut session, ChatAction::SubmitDraft);
    let request_id = match command {
        Some(ChatCommand::SendRequest { request_id, request }) => {
            assert_eq!(request.text, "Hi");
            request_id
        }
        None => panic!("expected a request"),
    };
    assert!(apply_action(&mut session, ChatAction::SubmitDraft).is_none());

    apply_action(
        &mut session,
        ChatAction::from((ConversationEvent::Failed("down".into()), request_id)),
    );
    assert_eq!(session.error(), Some("down"));
}

#[test]
fn select_attachment_action_replaces_and_rejects() {
    let mut session = create_test_session();
    apply_action(&mut session, ChatAction::SelectAttachment { file: png("a.png") });
    apply_action(&mut session, ChatAction::SelectAttachment { file: png("b.png") });
    assert_eq!(session.attachments().current().map(|f| f.name.as_str()), Some("b.png"));
    assert_eq!(session.attachments().registry().live(), 1);

    let text = AttachmentFile::new("notes.txt", "text/plain", vec![b'x']);
    apply_action(&mut session, ChatAction::SelectAttachment { file: text });
    assert_eq!(session.attachments().current().map(|f| f.name.as_str()), Some("b.png"));

    apply_action(&mut session, ChatAction::RemoveAttachment);
    assert!(!session.attachments().is_present());
    assert_eq!(session.attachments().registry().live(), 0);
}

struct CountingBackend {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    reply: Result<String, RequestError>,
}

impl CountingBackend {
    fn new(reply: Result<String, RequestError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            reply,
        })
    }
}

#[async_trait]
impl ConversationBackend for CountingBackend {
    async fn send(&self, request: &ConversationRequest) -> Result<String, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.text.clone());
        self.reply.clone()
    }
}

#[tokio::test]
async fn rapid_repeat_submissions_reach_the_backend_once() {
    let backend = CountingBackend::new(Ok(REPLY.to_string()));
    let (service, mut rx) = ConversationService::new(backend.clone());
    let mut session = create_test_session();

    session.set_draft("Hi");
    for _ in 0..3 {
        if let Some(ChatCommand::SendRequest {
            request_id,
            request,
        }) = apply_action(&mut session, ChatAction::SubmitDraft)
        {
            service.spawn_request(request_id, request);
        }
        session.set_draft("Hi");
    }

    let event = rx.recv().await.expect("event");
    apply_action(&mut session, ChatAction::from(event));

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        roles_and_texts(&session),
        vec![
            (TranscriptRole::User, "Hi".to_string()),
            (TranscriptRole::Assistant, REPLY.to_string()),
        ]
    );
    assert!(!session.is_loading());
}

#[tokio::test]
async fn sequential_exchanges_stay_in_request_order() {
    let backend = CountingBackend::new(Ok("ack".to_string()));
    let (service, mut rx) = ConversationService::new(backend.clone());
    let mut session = create_test_session();

    for text in ["one", "two", "three"] {
        session.set_draft(text);
        let pending = session.submit().expect("accepted");
        service.spawn_request(pending.request_id, pending.request);
        let (event, request_id) = rx.recv().await.expect("event");
        apply_action(&mut session, ChatAction::from((event, request_id)));
    }

    let texts: Vec<_> = session.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["one", "ack", "two", "ack", "three", "ack"]
    );
    assert_eq!(*backend.seen.lock().unwrap(), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn backend_failure_surfaces_as_view_error() {
    let backend = CountingBackend::new(Err(RequestError::Transport("connection refused".into())));
    let (service, mut rx) = ConversationService::new(backend);
    let mut session = create_test_session();

    session.set_draft("Hi");
    let pending = session.submit().expect("accepted");
    service.spawn_request(pending.request_id, pending.request);
    let event = rx.recv().await.expect("event");
    apply_action(&mut session, ChatAction::from(event));

    assert_eq!(session.messages().len(), 1);
    assert_eq!(
        session.error(),
        Some("Could not reach the chat service: connection refused")
    );
    assert!(!session.is_loading());
}
