//! End-to-end scenarios through a node wired to a recording platform:
//! gateway event → handler → platform calls, and the verification round trip
//! from panel button to role grant.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use warden_node::{
    InteractionHandler, InteractionSettings, NodeError, WardenConfig, WardenMetrics, WardenNode,
};
use warden_nullables::{NullClock, NullPlatform, Operation, PlatformCall};
use warden_platform::{
    Attachment, ChatEvent, Component, IncomingMessage, Interaction, InteractionKind,
    InteractionRef, InteractionResponse,
};
use warden_rpc::CallbackOutcome;
use warden_session::SessionStore;
use warden_types::{ChannelId, InteractionId, MessageId, RoleId, ScopeId, SessionId, SubjectId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const GUILD: &str = "guild-1";
const CHANNEL: &str = "general";

fn config() -> WardenConfig {
    WardenConfig {
        discord_token: "test-token".into(),
        verify_base_url: "https://verify.example".into(),
        service_tag: "tag".into(),
        verified_role_id: "role-verified".into(),
        ticket_role_id: "role-ticket".into(),
        staff_role_id: "role-staff".into(),
        http_port: 0,
        enable_gateway: false,
        ..Default::default()
    }
}

fn node() -> (Arc<NullPlatform>, Arc<NullClock>, WardenNode) {
    let platform = Arc::new(NullPlatform::new());
    let clock = Arc::new(NullClock::new(1_700_000_000_000));
    let node = WardenNode::new(config(), platform.clone(), clock.clone()).expect("valid config");
    (platform, clock, node)
}

fn message(id: u32, author: &str, body: &str) -> IncomingMessage {
    IncomingMessage {
        id: MessageId::new(format!("m{id}")),
        channel: ChannelId::new(CHANNEL),
        scope: Some(ScopeId::new(GUILD)),
        author: SubjectId::new(author),
        author_is_bot: false,
        body: body.to_string(),
        attachments: Vec::new(),
    }
}

fn interaction(user: &str, kind: InteractionKind) -> Interaction {
    Interaction {
        reference: InteractionRef {
            id: InteractionId::new("i-1"),
            token: "tok".into(),
        },
        scope: Some(ScopeId::new(GUILD)),
        channel: ChannelId::new(CHANNEL),
        channel_is_thread: false,
        user: SubjectId::new(user),
        user_tag: format!("{user}#0001"),
        is_admin: false,
        kind,
    }
}

fn button(user: &str, custom_id: &str) -> Interaction {
    interaction(
        user,
        InteractionKind::Button {
            custom_id: custom_id.into(),
        },
    )
}

fn command(user: &str, name: &str) -> Interaction {
    interaction(user, InteractionKind::Command { name: name.into() })
}

fn ticket_modal(user: &str, category: &str, title: &str) -> Interaction {
    interaction(
        user,
        InteractionKind::ModalSubmit {
            custom_id: format!("ticket_modal_{category}"),
            fields: HashMap::from([("ticket_title".to_string(), title.to_string())]),
        },
    )
}

fn responses(platform: &NullPlatform) -> Vec<InteractionResponse> {
    platform
        .calls_of(Operation::Respond)
        .into_iter()
        .filter_map(|c| match c {
            PlatformCall::Respond { response, .. } => Some(response),
            _ => None,
        })
        .collect()
}

fn last_text(platform: &NullPlatform) -> String {
    match responses(platform).pop() {
        Some(InteractionResponse::Message(m)) => m.content.unwrap_or_default(),
        other => panic!("expected a message response, got {other:?}"),
    }
}

fn session_from_url(text: &str) -> SessionId {
    let url = text
        .split_whitespace()
        .find(|w| w.starts_with("https://verify.example/tag/"))
        .expect("verification url in reply");
    SessionId::new(url.rsplit('/').next().unwrap())
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn flood_of_messages_times_member_out() {
    let (platform, clock, node) = node();
    for i in 0..5 {
        node.handle_event(ChatEvent::MessageCreated(message(i, "spammer", &format!("hello {i}"))))
            .await;
        clock.advance(500);
    }

    let restricts = platform.calls_of(Operation::RestrictMember);
    assert_eq!(restricts.len(), 1);
    let PlatformCall::RestrictMember { subject, duration, .. } = &restricts[0] else {
        unreachable!()
    };
    assert_eq!(subject.as_str(), "spammer");
    assert_eq!(*duration, Duration::from_secs(300));
    assert_eq!(platform.count(Operation::DeleteMessage), 0);
    assert_eq!(platform.count(Operation::SendMessage), 1);
    assert_eq!(node.metrics().messages_classified.get(), 5);
    assert_eq!(node.metrics().enforcements.with_label_values(&["burst"]).get(), 1);
}

#[tokio::test]
async fn event_loop_finishes_in_flight_handlers_before_returning() {
    let (platform, _clock, node) = node();
    platform.set_latency(Duration::from_millis(50));

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let run = tokio::spawn(node.router().clone().run(rx, 2));
    for i in 0..5 {
        let event = ChatEvent::MessageCreated(message(i, "spammer", &format!("hello {i}")));
        tx.send(event).await.unwrap();
    }
    drop(tx);
    run.await.unwrap();

    assert_eq!(node.metrics().messages_classified.get(), 5);
    assert_eq!(platform.count(Operation::RestrictMember), 1);
    assert_eq!(platform.count(Operation::SendMessage), 1);
}

#[tokio::test]
async fn credential_leak_is_deleted_and_restricted() {
    let (platform, _clock, node) = node();
    let token = format!("{}.{}.{}", "A".repeat(24), "b".repeat(6), "C".repeat(27));
    node.handle_event(ChatEvent::MessageCreated(message(1, "leaker", &format!("my token {token}"))))
        .await;

    let deletes = platform.calls_of(Operation::DeleteMessage);
    assert_eq!(deletes.len(), 1);
    let PlatformCall::DeleteMessage(reference) = &deletes[0] else {
        unreachable!()
    };
    assert_eq!(reference.message.as_str(), "m1");
    assert_eq!(platform.count(Operation::RestrictMember), 1);
}

#[tokio::test]
async fn animated_attachment_is_deleted() {
    let (platform, _clock, node) = node();
    let mut msg = message(1, "u", "");
    msg.attachments.push(Attachment {
        filename: "flash.gif".into(),
        content_type: Some("image/gif".into()),
    });
    node.handle_event(ChatEvent::MessageCreated(msg)).await;
    assert_eq!(platform.count(Operation::DeleteMessage), 1);
    assert_eq!(platform.count(Operation::RestrictMember), 1);
}

#[tokio::test]
async fn bots_and_direct_messages_are_ignored() {
    let (platform, _clock, node) = node();
    for i in 0..10 {
        let mut from_bot = message(i, "bot", "same");
        from_bot.author_is_bot = true;
        node.handle_event(ChatEvent::MessageCreated(from_bot)).await;

        let mut dm = message(100 + i, "human", "same");
        dm.scope = None;
        node.handle_event(ChatEvent::MessageCreated(dm)).await;
    }
    assert!(platform.calls().is_empty());
    assert_eq!(node.metrics().messages_classified.get(), 0);
}

#[tokio::test]
async fn enforcement_steps_survive_platform_failures() {
    let (platform, _clock, node) = node();
    platform.fail(Operation::DeleteMessage);
    platform.fail(Operation::RestrictMember);
    let token = format!("{}.{}.{}", "x".repeat(24), "y".repeat(6), "z".repeat(27));
    node.handle_event(ChatEvent::MessageCreated(message(1, "u", &token))).await;

    assert_eq!(platform.count(Operation::DeleteMessage), 1);
    assert_eq!(platform.count(Operation::RestrictMember), 1);
    assert_eq!(platform.count(Operation::SendMessage), 1);
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verification_round_trip_grants_role_once() {
    let (platform, _clock, node) = node();
    node.handle_event(ChatEvent::Interaction(button("alice", "start_verification")))
        .await;

    let reply = last_text(&platform);
    assert!(reply.contains("10 minutes"));
    let session = session_from_url(&reply);
    assert_eq!(session.as_str().len(), 32);

    let alice = SubjectId::new("alice");
    let guild = ScopeId::new(GUILD);
    let outcome = node
        .verification()
        .complete_verification(&session, &alice, &guild)
        .await;
    assert_eq!(outcome, CallbackOutcome::Granted);

    let grants = platform.calls_of(Operation::AddRole);
    assert_eq!(
        grants,
        vec![PlatformCall::AddRole {
            scope: guild.clone(),
            subject: alice.clone(),
            role: RoleId::new("role-verified"),
        }]
    );

    let replay = node
        .verification()
        .complete_verification(&session, &alice, &guild)
        .await;
    assert_eq!(replay, CallbackOutcome::Invalid);
    assert_eq!(platform.count(Operation::AddRole), 1);
    assert_eq!(node.metrics().sessions_created.get(), 1);
    assert_eq!(
        node.metrics()
            .verifications
            .with_label_values(&["granted"])
            .get(),
        1
    );
}

#[tokio::test]
async fn expired_session_is_swept_and_rejected() {
    let (_platform, clock, node) = node();
    node.handle_event(ChatEvent::Interaction(button("bob", "start_verification")))
        .await;
    assert_eq!(node.sessions().len().await, 1);

    clock.advance_secs(601);
    let (purged, _) = node.sweep().await;
    assert_eq!(purged, 1);
    assert_eq!(node.metrics().live_sessions.get(), 0);
}

#[tokio::test]
async fn verification_needs_a_guild() {
    let (platform, _clock, node) = node();
    let mut press = button("carol", "start_verification");
    press.scope = None;
    node.handle_event(ChatEvent::Interaction(press)).await;
    assert!(last_text(&platform).starts_with("❌"));
    assert!(node.sessions().is_empty().await);
}

// ---------------------------------------------------------------------------
// Commands and tickets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ready_registers_commands() {
    let (platform, _clock, node) = node();
    node.handle_event(ChatEvent::Ready {
        bot_user: SubjectId::new("bot"),
    })
    .await;
    let calls = platform.calls_of(Operation::RegisterCommands);
    let PlatformCall::RegisterCommands(commands) = &calls[0] else {
        unreachable!()
    };
    let names: Vec<_> = commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["verify", "ticket", "ticket_close"]);
}

#[tokio::test]
async fn panel_commands_are_admin_only() {
    let (platform, _clock, node) = node();
    node.handle_event(ChatEvent::Interaction(command("dave", "verify")))
        .await;
    let Some(InteractionResponse::Message(refusal)) = responses(&platform).pop() else {
        panic!("expected a reply");
    };
    assert!(refusal.ephemeral);
    assert!(refusal.rows.is_empty());

    let mut admin = command("erin", "ticket");
    admin.is_admin = true;
    node.handle_event(ChatEvent::Interaction(admin)).await;
    let Some(InteractionResponse::Message(panel)) = responses(&platform).pop() else {
        panic!("expected a reply");
    };
    assert!(!panel.ephemeral);
    assert!(matches!(
        &panel.rows[0].components[0],
        Component::Button { custom_id, .. } if custom_id == "create_ticket"
    ));
}

#[tokio::test]
async fn category_select_opens_title_modal() {
    let (platform, _clock, node) = node();
    node.handle_event(ChatEvent::Interaction(interaction(
        "frank",
        InteractionKind::Select {
            custom_id: "ticket_category".into(),
            values: vec!["discord".into()],
        },
    )))
    .await;
    let Some(InteractionResponse::Modal(modal)) = responses(&platform).pop() else {
        panic!("expected a modal");
    };
    assert_eq!(modal.custom_id, "ticket_modal_discord");
    assert!(matches!(
        &modal.rows[0].components[0],
        Component::TextInput { custom_id, max_length: Some(100), required: true, .. }
            if custom_id == "ticket_title"
    ));
}

#[tokio::test]
async fn ticket_submission_opens_private_thread() {
    let (platform, _clock, node) = node();
    node.handle_event(ChatEvent::Interaction(ticket_modal("gina", "wiki", "Broken link")))
        .await;

    assert_eq!(
        platform.calls_of(Operation::AddRole),
        vec![PlatformCall::AddRole {
            scope: ScopeId::new(GUILD),
            subject: SubjectId::new("gina"),
            role: RoleId::new("role-ticket"),
        }]
    );
    assert_eq!(
        platform.calls_of(Operation::CreateThread),
        vec![PlatformCall::CreateThread {
            parent: ChannelId::new(CHANNEL),
            name: "Rec Wiki - Broken link".into(),
        }]
    );
    assert_eq!(platform.count(Operation::AddThreadMember), 1);

    let sends = platform.calls_of(Operation::SendMessage);
    let PlatformCall::SendMessage { channel, message } = &sends[0] else {
        unreachable!()
    };
    assert_eq!(channel.as_str(), "thread-1");
    assert!(message.embeds[0].description.contains("<@gina>"));
    assert!(message.embeds[0].description.contains("<@&role-staff>"));

    assert!(last_text(&platform).contains("<#thread-1>"));
}

#[tokio::test]
async fn ticket_role_failure_does_not_block_thread() {
    let (platform, _clock, node) = node();
    platform.fail(Operation::AddRole);
    node.handle_event(ChatEvent::Interaction(ticket_modal("hank", "other", "Hi")))
        .await;
    assert_eq!(platform.count(Operation::CreateThread), 1);
    assert!(last_text(&platform).starts_with("✅"));
}

#[tokio::test]
async fn thread_failure_replies_with_error() {
    let (platform, _clock, node) = node();
    platform.fail(Operation::CreateThread);
    node.handle_event(ChatEvent::Interaction(ticket_modal("ivy", "wiki", "Help")))
        .await;
    assert_eq!(platform.count(Operation::AddThreadMember), 0);
    assert_eq!(platform.count(Operation::SendMessage), 0);
    assert!(last_text(&platform).starts_with("❌"));
}

#[tokio::test]
async fn unknown_category_is_refused() {
    let (platform, _clock, node) = node();
    node.handle_event(ChatEvent::Interaction(ticket_modal("jo", "billing", "Help")))
        .await;
    assert_eq!(platform.count(Operation::CreateThread), 0);
    assert!(last_text(&platform).starts_with("❌"));
}

fn ticket_handler(platform: Arc<NullPlatform>) -> InteractionHandler {
    let clock = Arc::new(NullClock::new(0));
    InteractionHandler::new(
        platform,
        Arc::new(SessionStore::new(clock.clone(), 600_000)),
        clock,
        Arc::new(WardenMetrics::new().unwrap()),
        InteractionSettings {
            verify_base_url: "https://verify.example".into(),
            service_tag: "tag".into(),
            ticket_role: RoleId::new("role-ticket"),
            staff_role: RoleId::new("role-staff"),
        },
    )
    .with_delete_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn ticket_close_archives_then_deletes_thread() {
    let platform = Arc::new(NullPlatform::new());
    let handler = ticket_handler(platform.clone());

    let mut close = command("kim", "ticket_close");
    close.channel = ChannelId::new("thread-9");
    close.channel_is_thread = true;
    handler.handle(close).await;

    assert_eq!(platform.count(Operation::Respond), 1);
    assert_eq!(
        platform.calls_of(Operation::ArchiveThread),
        vec![PlatformCall::ArchiveThread(ChannelId::new("thread-9"))]
    );
    assert!(handler.drain_pending(Duration::from_secs(2)).await);
    assert_eq!(
        platform.calls_of(Operation::DeleteChannel),
        vec![PlatformCall::DeleteChannel(ChannelId::new("thread-9"))]
    );
}

#[tokio::test]
async fn ticket_close_outside_thread_is_refused() {
    let platform = Arc::new(NullPlatform::new());
    let handler = ticket_handler(platform.clone());
    handler.handle(command("lee", "ticket_close")).await;

    assert_eq!(platform.count(Operation::ArchiveThread), 0);
    assert!(handler.drain_pending(Duration::from_secs(1)).await);
    assert_eq!(platform.count(Operation::DeleteChannel), 0);
    assert!(last_text(&platform).starts_with("❌"));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_config_is_rejected() {
    let platform = Arc::new(NullPlatform::new());
    let clock = Arc::new(NullClock::new(0));
    let mut bad = config();
    bad.discord_token.clear();
    assert!(matches!(
        WardenNode::new(bad, platform.clone(), clock.clone()),
        Err(NodeError::Config(_))
    ));

    let mut no_burst = config();
    no_burst.burst_threshold = 0;
    assert!(matches!(
        WardenNode::new(no_burst, platform.clone(), clock.clone()),
        Err(NodeError::Config(_))
    ));

    let mut no_repeat = config();
    no_repeat.repeat_threshold = 0;
    assert!(matches!(
        WardenNode::new(no_repeat, platform, clock),
        Err(NodeError::Config(_))
    ));
}

#[tokio::test]
async fn start_and_stop_without_gateway() {
    let (_platform, _clock, mut node) = node();
    node.start().await.expect("start");
    assert!(node.http_addr().is_some());
    assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
    node.stop().await.expect("clean stop");
}

#[tokio::test]
async fn occupied_port_is_fatal() {
    let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let platform = Arc::new(NullPlatform::new());
    let clock = Arc::new(NullClock::new(0));
    let mut cfg = config();
    cfg.http_port = port;
    let mut node = WardenNode::new(cfg, platform, clock).unwrap();
    assert!(matches!(node.start().await, Err(NodeError::Rpc(_))));
}
