// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Messenger connector: inbound routing and
//! normalization through the endpoint, outbound delivery against a mock
//! Graph API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courier_config::model::DeliveryConfig;
use courier_core::signature::SignatureAlgorithm;
use courier_core::{
    Action, ActionKind, AttachmentKind, AttachmentSource, ChallengeQuery, Connector,
    ConnectorRegistry, EventKind, WebhookEndpoint,
};
use courier_messenger::{MessengerSetup, build};
use courier_test_utils::MockController;
use courier_test_utils::fixtures::{
    MESSENGER_SECRET, VERIFY_TOKEN, messenger_callback, messenger_config, messenger_connector,
    messenger_text_callback, signed,
};

fn setup(server_uri: &str, controller: Arc<MockController>) -> (MessengerSetup, Arc<ConnectorRegistry>) {
    let registry = Arc::new(ConnectorRegistry::new());
    let config = messenger_config(
        server_uri,
        vec![
            messenger_connector("c1", "A1", "P1", "/messenger"),
            messenger_connector("c2", "A1", "P2", "/messenger"),
        ],
    );
    let setup = build(
        &config,
        &DeliveryConfig::default(),
        Arc::clone(&registry),
        controller,
    )
    .unwrap();
    (setup, registry)
}

async fn mount_send_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recipient_id": "U1",
            "message_id": "mid.out"
        })))
        .mount(server)
        .await;
}

/// Bodies of the requests received on `/me/messages` carrying a message, in arrival order.
async fn sent_messages(server: &MockServer, expected: usize) -> Vec<Value> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let messages: Vec<Value> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/me/messages")
            .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
            .filter(|b| b.get("message").is_some())
            .collect();
        if messages.len() >= expected || tokio::time::Instant::now() > deadline {
            return messages;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_requests(server: &MockServer, expected: usize) -> Vec<wiremock::Request> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= expected || tokio::time::Instant::now() > deadline {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---- Test 1: one endpoint serves both connectors of the application ----
#[tokio::test]
async fn endpoints_grouped_by_path() {
    let server = MockServer::start().await;
    let (setup, registry) = setup(&server.uri(), MockController::new());
    assert_eq!(setup.connectors.len(), 2);
    assert_eq!(setup.endpoints.len(), 1);
    assert_eq!(setup.endpoints[0].path(), "/messenger");
    assert_eq!(registry.connector_ids(), vec!["c1", "c2"]);
    assert!(setup.subscription_checker.is_none());
}

// ---- Test 2: signed hello normalizes to a sentence for the page's connector ----
#[tokio::test]
async fn signed_hello_reaches_controller() {
    let server = MockServer::start().await;
    let controller = MockController::new();
    let (setup, _) = setup(&server.uri(), Arc::clone(&controller));
    let endpoint = &setup.endpoints[0];

    let body = messenger_text_callback("P2", "U1", "hello", "m.1");
    let (bytes, header) = signed(SignatureAlgorithm::Sha1, MESSENGER_SECRET, &body);
    assert!(endpoint.verify_signature(Some(&header), &bytes));
    assert_eq!(endpoint.process(&bytes).await.unwrap(), 1);

    let events = controller.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].application_id, "c2");
    assert_eq!(events[0].sender_id, "U1");
    assert_eq!(events[0].recipient_id, "P2");
    assert_eq!(events[0].correlation_id.as_deref(), Some("m.1"));
    assert_eq!(
        events[0].kind,
        EventKind::Sentence {
            text: "hello".into()
        }
    );
}

// ---- Test 3: a tampered body fails verification ----
#[tokio::test]
async fn tampered_body_rejected() {
    let server = MockServer::start().await;
    let (setup, _) = setup(&server.uri(), MockController::new());
    let endpoint = &setup.endpoints[0];

    let body = messenger_text_callback("P1", "U1", "hello", "m.1");
    let (mut bytes, header) = signed(SignatureAlgorithm::Sha1, MESSENGER_SECRET, &body);
    let last = bytes.len() - 2;
    bytes[last] ^= 0x01;
    assert!(!endpoint.verify_signature(Some(&header), &bytes));
    assert!(!endpoint.verify_signature(None, &bytes));
}

// ---- Test 4: malformed sub-events do not abort their siblings ----
#[tokio::test]
async fn malformed_sub_event_isolated() {
    let server = MockServer::start().await;
    let controller = MockController::new();
    let (setup, _) = setup(&server.uri(), Arc::clone(&controller));

    let body = messenger_callback(
        "P1",
        vec![
            json!({"sender": "not-an-object", "recipient": {"id": "P1"}}),
            json!({"sender": {"id": "U1"}, "recipient": {"id": "P1"},
                   "postback": {"payload": "weather?city=Lyon", "title": "Weather"}}),
            json!({"sender": {"id": "U1"}, "recipient": {"id": "P1"},
                   "message": {"mid": "m.2", "text": "echo", "is_echo": true, "app_id": 1}}),
        ],
    );
    let handled = setup.endpoints[0]
        .process(body.to_string().as_bytes())
        .await
        .unwrap();
    assert_eq!(handled, 1);

    let mut parameters = BTreeMap::new();
    parameters.insert("city".to_string(), "Lyon".to_string());
    assert_eq!(
        controller.events()[0].kind,
        EventKind::Choice {
            intent: "weather".into(),
            parameters
        }
    );
}

// ---- Test 5: standby traffic is marked with the thread owner ----
#[tokio::test]
async fn standby_marked_as_notification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/thread_owner"))
        .and(query_param("recipient", "U1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"thread_owner": {"app_id": "inbox-app"}}]
        })))
        .mount(&server)
        .await;
    let controller = MockController::new();
    let (setup, _) = setup(&server.uri(), Arc::clone(&controller));

    let body = json!({
        "object": "page",
        "entry": [{
            "id": "P1",
            "time": 1,
            "standby": [{"sender": {"id": "U1"}, "recipient": {"id": "P1"},
                         "message": {"mid": "m.3", "text": "talking to a human"}}]
        }]
    });
    setup.endpoints[0]
        .process(body.to_string().as_bytes())
        .await
        .unwrap();

    let event = &controller.events()[0];
    assert!(event.notification);
    assert_eq!(event.source_application_id.as_deref(), Some("inbox-app"));
}

// ---- Test 6: handshake echoes the challenge only for the right token ----
#[tokio::test]
async fn challenge_requires_verify_token() {
    let server = MockServer::start().await;
    let (setup, _) = setup(&server.uri(), MockController::new());
    let endpoint = &setup.endpoints[0];

    let good = ChallengeQuery {
        mode: Some("subscribe".into()),
        verify_token: Some(VERIFY_TOKEN.into()),
        challenge: Some("1158201444".into()),
    };
    assert_eq!(endpoint.verify_challenge(&good).as_deref(), Some("1158201444"));

    let bad = ChallengeQuery {
        verify_token: Some("wrong".into()),
        ..good
    };
    assert!(endpoint.verify_challenge(&bad).is_none());
}

// ---- Test 7: actions for one recipient are delivered in order with typing signals ----
#[tokio::test]
async fn delivery_preserves_order() {
    let server = MockServer::start().await;
    mount_send_ok(&server).await;
    let (setup, _) = setup(&server.uri(), MockController::new());
    let connector = &setup.connectors[0];

    connector.send(Action::text("U1", "c1", "first"), Duration::ZERO);
    connector.send(
        Action::text("U1", "c1", "second").last_answer(),
        Duration::ZERO,
    );

    let messages = sent_messages(&server, 2).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"]["text"], "first");
    assert_eq!(messages[1]["message"]["text"], "second");

    let requests = wait_for_requests(&server, 5).await;
    let signals: Vec<String> = requests
        .iter()
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .filter_map(|b| b["sender_action"].as_str().map(String::from))
        .collect();
    assert_eq!(signals, vec!["typing_on", "typing_off", "mark_seen"]);
    assert!(
        requests
            .iter()
            .all(|r| r.url.query().is_some_and(|q| q.contains("access_token=token-c1")))
    );
}

// ---- Test 8: a fatal platform error is reported to the controller ----
#[tokio::test]
async fn delivery_failure_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "This person isn't available right now.", "code": 551}
        })))
        .mount(&server)
        .await;
    let controller = MockController::new();
    let (setup, _) = setup(&server.uri(), Arc::clone(&controller));

    setup.connectors[0].send(Action::text("U1", "c1", "hello"), Duration::ZERO);

    let errors = controller
        .wait_for_errors(1, Duration::from_secs(5))
        .await;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "connector error: This person isn't available right now."
    );
}

// ---- Test 9: an unknown connector never sends with a guessed token ----
#[tokio::test]
async fn unknown_connector_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let controller = MockController::new();
    let (setup, _) = setup(&server.uri(), Arc::clone(&controller));

    setup.connectors[0].send(Action::text("U1", "ghost", "hello"), Duration::ZERO);

    // No controller is registered for "ghost": nothing can be reported either.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(controller.errors().is_empty());
}

// ---- Test 10: URL attachments are uploaded once and reused ----
#[tokio::test]
async fn url_attachment_uploaded_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/message_attachments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "attachment_id": "att-42"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_send_ok(&server).await;
    let (setup, _) = setup(&server.uri(), MockController::new());

    let image = |recipient: &str| {
        Action::new(
            recipient,
            "c1",
            ActionKind::Attachment {
                kind: AttachmentKind::Image,
                source: AttachmentSource::Url("https://cdn/cat.png".into()),
            },
        )
    };
    setup.connectors[0].send(image("U1"), Duration::ZERO);
    sent_messages(&server, 1).await;
    setup.connectors[0].send(image("U2"), Duration::ZERO);

    let messages = sent_messages(&server, 2).await;
    assert_eq!(messages.len(), 2);
    for message in &messages {
        assert_eq!(
            message["message"]["attachment"]["payload"]["attachment_id"],
            "att-42"
        );
    }
}

// ---- Test 11: a failed upload falls back to the reusable url ----
#[tokio::test]
async fn failed_upload_sends_by_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/message_attachments"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recipient_id": "U1",
            "message_id": "mid.7",
            "attachment_id": "att-7"
        })))
        .mount(&server)
        .await;
    let (setup, _) = setup(&server.uri(), MockController::new());

    setup.connectors[0].send(
        Action::new(
            "U1",
            "c1",
            ActionKind::Attachment {
                kind: AttachmentKind::File,
                source: AttachmentSource::Url("https://cdn/menu.pdf".into()),
            },
        ),
        Duration::ZERO,
    );

    let messages = sent_messages(&server, 1).await;
    let payload = &messages[0]["message"]["attachment"]["payload"];
    assert_eq!(payload["url"], "https://cdn/menu.pdf");
    assert_eq!(payload["is_reusable"], true);
}

// ---- Test 12: notify injects a choice for the recipient ----
#[tokio::test]
async fn notify_injects_choice() {
    let server = MockServer::start().await;
    let controller = MockController::new();
    let (setup, _) = setup(&server.uri(), Arc::clone(&controller));

    let mut parameters = BTreeMap::new();
    parameters.insert("order".to_string(), "42".to_string());
    setup.connectors[1]
        .notify("U9", "order_shipped", parameters.clone(), None)
        .await
        .unwrap();

    let event = &controller.events()[0];
    assert_eq!(event.sender_id, "U9");
    assert_eq!(event.recipient_id, "P2");
    assert_eq!(event.application_id, "c2");
    assert_eq!(
        event.kind,
        EventKind::Choice {
            intent: "order_shipped".into(),
            parameters
        }
    );
}

// ---- Test 13: a final location still ends the typing indicator ----
#[tokio::test]
async fn last_location_sends_end_of_turn_signals() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"recipient_id": "U1"})))
        .mount(&server)
        .await;
    let controller = MockController::new();
    let (setup, _) = setup(&server.uri(), Arc::clone(&controller));

    let location = Action::new(
        "U1",
        "c1",
        ActionKind::Location {
            latitude: 48.85,
            longitude: 2.35,
            name: None,
            address: None,
        },
    )
    .last_answer();
    setup.connectors[0].send(location, Duration::ZERO);

    let requests = wait_for_requests(&server, 2).await;
    let bodies: Vec<Value> = requests
        .iter()
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .collect();
    assert!(bodies.iter().all(|b| b.get("message").is_none()));
    let signals: Vec<&str> = bodies
        .iter()
        .filter_map(|b| b["sender_action"].as_str())
        .collect();
    assert_eq!(signals, vec!["typing_off", "mark_seen"]);
    assert!(controller.errors().is_empty());
}
