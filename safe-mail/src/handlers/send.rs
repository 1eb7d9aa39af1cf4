//! Bulk send endpoint
//!
//! `POST /send` runs one request through a linear pipeline; every step is a
//! terminal exit on failure:
//!
//! 1. Required fields present
//! 2. Identity below its hourly limit
//! 3. Recipients parsed and capacity reserved
//! 4. Subject and body normalized, trailer appended
//! 5. Mail capability created for the caller's credentials and verified
//! 6. One message per recipient dispatched in paced batches
//! 7. Delivered count committed to the quota
//!
//! # Example
//!
//! ```bash
//! POST /send
//! {"senderName": "Alice", "gmail": "alice@gmail.com", "apppass": "...",
//!  "to": "a@b.com, c@d.com", "subject": "Hello", "message": "Hi there"}
//! ```
//!
//! Response:
//! ```json
//! {"success": true, "sent": 2, "count": 2}
//! ```

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::content::normalize_subject;
use crate::dispatch::send_batched;
use crate::email::{Email, SenderCredentials};
use crate::error::{SendError, SendResponse};
use crate::recipients::parse_recipients;
use crate::state::AppState;

/// Incoming send request
///
/// Every field is optional at the parsing level so that absent and empty
/// fields produce the same "missing fields" result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendRequest {
    /// Display name for the From header
    pub sender_name: Option<String>,

    /// Sender identity (account address)
    pub gmail: Option<String>,

    /// Sender credential (app password)
    pub apppass: Option<String>,

    /// Raw recipient list, comma or newline separated
    pub to: Option<String>,

    /// Raw subject
    pub subject: Option<String>,

    /// Raw message body
    pub message: Option<String>,
}

/// Required fields borrowed from a validated request
#[derive(Debug, Clone, Copy)]
struct RequiredFields<'a> {
    sender_name: &'a str,
    identity: &'a str,
    secret: &'a str,
    to: &'a str,
    subject: &'a str,
    message: &'a str,
}

impl SendRequest {
    fn required(&self) -> Result<RequiredFields<'_>, SendError> {
        fn present(field: Option<&str>) -> Result<&str, SendError> {
            field
                .filter(|value| !value.is_empty())
                .ok_or(SendError::MissingFields)
        }

        Ok(RequiredFields {
            sender_name: self.sender_name.as_deref().unwrap_or_default(),
            identity: present(self.gmail.as_deref())?,
            secret: present(self.apppass.as_deref())?,
            to: present(self.to.as_deref())?,
            subject: present(self.subject.as_deref())?,
            message: present(self.message.as_deref())?,
        })
    }
}

/// `POST /send`
///
/// Always answers with HTTP 200 and a JSON body; a body that is not valid
/// JSON is reported as missing fields.
///
/// The pipeline runs on its own task, so a client that disconnects
/// mid-dispatch does not stop the remaining batches or the quota commit.
///
/// # Errors
///
/// Returns the [`SendError`] of the first pipeline step that fails
///
/// # Panics
///
/// Re-raises a panic from the pipeline task
pub async fn send(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, SendError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection, "Rejected send request body");
        SendError::MissingFields
    })?;

    let pipeline = tokio::spawn(async move { process(&state, &request).await });
    pipeline
        .await
        .unwrap_or_else(|error| std::panic::resume_unwind(error.into_panic()))
        .map(Json)
}

/// Run one send request through the pipeline
///
/// Dropping the returned future part way through dispatch abandons the
/// remaining batches; [`send`] detaches it for that reason.
///
/// # Errors
///
/// Returns the [`SendError`] of the first step that fails
pub async fn process(state: &AppState, request: &SendRequest) -> Result<SendResponse, SendError> {
    let fields = request.required().inspect_err(|_| {
        info!("Send request rejected: missing fields");
    })?;
    let identity = fields.identity;

    state.quota().check(identity)?;

    let recipients = parse_recipients(fields.to);
    let reservation = state.quota().check_and_reserve(identity, recipients.len())?;

    let subject = normalize_subject(fields.subject);
    let body = state
        .normalizer()
        .body_with_trailer(fields.message, &state.config().content.trailer);

    let policy = state.batch_policy();
    let credentials = SenderCredentials::new(identity, fields.secret);
    let sender = state
        .connector()
        .connect(&credentials, policy.batch_size)
        .map_err(|error| {
            warn!(identity = %identity, %error, "Could not create mail transport");
            SendError::WrongCredential {
                count: state.quota().count(identity),
            }
        })?;

    if let Err(error) = sender.verify().await {
        warn!(identity = %identity, %error, "Credential verification failed");
        sender.close().await;
        return Err(SendError::WrongCredential {
            count: state.quota().count(identity),
        });
    }

    let messages: Vec<Email> = recipients
        .iter()
        .map(|recipient| {
            Email::new()
                .from_named(fields.sender_name, identity)
                .to(recipient)
                .reply_to(identity)
                .subject(&subject)
                .text(&body)
        })
        .collect();

    info!(
        identity = %identity,
        recipients = messages.len(),
        current_count = reservation.current_count(),
        "Dispatching"
    );
    let sent = send_batched(sender.as_ref(), &messages, policy).await;
    sender.close().await;

    let count = reservation.commit(sent);
    info!(identity = %identity, sent, count, "Send request completed");

    Ok(SendResponse::delivered(sent, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafeMailConfig;
    use crate::email::{EmailError, EmailSender, MailConnector, MockEmailSender};
    use crate::quota::{QuotaError, QuotaTracker};
    use crate::router::router;
    use crate::testing::{RecordingSender, StaticConnector};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> SafeMailConfig {
        let mut config = SafeMailConfig::default();
        config.dispatch.batch_delay_ms = 0;
        config
    }

    fn setup(sender: RecordingSender) -> (TestServer, AppState, StaticConnector) {
        let connector = StaticConnector::new(sender);
        let state = AppState::with_connector(config(), Arc::new(connector.clone())).unwrap();
        let server = TestServer::new(router(state.clone())).unwrap();
        (server, state, connector)
    }

    fn body(to: &str) -> Value {
        json!({
            "senderName": "Alice",
            "gmail": "alice@gmail.com",
            "apppass": "app-pass",
            "to": to,
            "subject": "Big   news!!!",
            "message": "Hello\r\n\r\n\r\nreport\r\nThanks",
        })
    }

    fn request(to: &str) -> SendRequest {
        serde_json::from_value(body(to)).unwrap()
    }

    fn recipients(count: usize) -> String {
        (0..count)
            .map(|i| format!("user{i}@example.com"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[tokio::test]
    async fn test_sends_to_two_recipients() {
        let (server, state, connector) = setup(RecordingSender::new());

        let response = server.post("/send").json(&body("a@b.com, c@d.com")).await;

        response.assert_status_ok();
        response.assert_json(&json!({"success": true, "sent": 2, "count": 2}));
        assert_eq!(state.quota().count("alice@gmail.com"), 2);
        assert_eq!(connector.connections(), vec![("alice@gmail.com".to_string(), 3)]);
        assert_eq!(connector.sender().sent_count(), 2);
        assert!(connector.sender().is_closed());
    }

    #[tokio::test]
    async fn test_prepared_message_contents() {
        let (server, _state, connector) = setup(RecordingSender::new());

        server.post("/send").json(&body("bob@example.com")).await.assert_status_ok();

        let sent = connector.sender().sent_emails();
        assert_eq!(sent.len(), 1);
        let email = &sent[0];
        assert_eq!(email.from.as_deref(), Some("alice@gmail.com"));
        assert_eq!(email.from_name.as_deref(), Some("Alice"));
        assert_eq!(email.to.as_deref(), Some("bob@example.com"));
        assert_eq!(email.reply_to.as_deref(), Some("alice@gmail.com"));
        assert_eq!(email.subject.as_deref(), Some("Big news!"));
        assert_eq!(
            email.text.as_deref(),
            Some("Hello\n\nthe report details are shared below\nThanks\n\nScanned & secured")
        );
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let (server, _state, connector) = setup(RecordingSender::new());

        let mut request = body("a@b.com");
        request["apppass"] = json!("");
        let response = server.post("/send").json(&request).await;
        response.assert_status_ok();
        response.assert_json(&json!({"success": false, "msg": "Missing Fields ❌", "count": 0}));

        let response = server.post("/send").json(&json!({"gmail": "alice@gmail.com"})).await;
        response.assert_json(&json!({"success": false, "msg": "Missing Fields ❌", "count": 0}));

        assert!(connector.connections().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_missing_fields() {
        let (server, _state, _connector) = setup(RecordingSender::new());

        let response = server.post("/send").text("not json").await;

        response.assert_status_ok();
        response.assert_json(&json!({"success": false, "msg": "Missing Fields ❌", "count": 0}));
    }

    #[tokio::test]
    async fn test_hourly_limit_reached() {
        let (server, state, connector) = setup(RecordingSender::new());
        state.quota().commit("alice@gmail.com", 28);

        let response = server.post("/send").json(&body("a@b.com")).await;

        response.assert_json(&json!({"success": false, "msg": "Hourly Limit Reached ❌", "count": 28}));
        assert!(connector.connections().is_empty());
    }

    #[tokio::test]
    async fn test_limit_full() {
        let (server, state, connector) = setup(RecordingSender::new());
        state.quota().commit("alice@gmail.com", 27);

        let response = server.post("/send").json(&body("a@b.com\nc@d.com")).await;

        response.assert_json(&json!({"success": false, "msg": "Mail Limit Full ❌", "count": 27}));
        assert_eq!(state.quota().count("alice@gmail.com"), 27);
        assert!(connector.connections().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_credential_sends_nothing() {
        let (server, state, connector) = setup(RecordingSender::new().rejecting_credentials());
        state.quota().commit("alice@gmail.com", 5);

        let response = server.post("/send").json(&body("a@b.com, c@d.com")).await;

        response.assert_json(&json!({"success": false, "msg": "Wrong App Password ❌", "count": 5}));
        assert_eq!(connector.sender().verify_calls(), 1);
        assert_eq!(connector.sender().attempts(), 0);
        assert!(connector.sender().is_closed());
        assert_eq!(state.quota().count("alice@gmail.com"), 5);

        // The reservation was released
        let reservation = state.quota().check_and_reserve("alice@gmail.com", 23).unwrap();
        assert_eq!(reservation.reserved(), 23);
        drop(reservation);
    }

    #[tokio::test]
    async fn test_partial_failure_counts_only_successes() {
        let (server, state, _connector) =
            setup(RecordingSender::new().failing_for(["c@d.com"]));
        state.quota().commit("alice@gmail.com", 1);

        let response = server.post("/send").json(&body("a@b.com, c@d.com, e@f.com, g@h.com")).await;

        response.assert_json(&json!({"success": true, "sent": 3, "count": 4}));
        assert_eq!(state.quota().count("alice@gmail.com"), 4);
    }

    #[tokio::test]
    async fn test_no_valid_recipients_is_zero_sent() {
        let (server, _state, connector) = setup(RecordingSender::new());

        let response = server.post("/send").json(&body("nobody, nowhere")).await;

        response.assert_json(&json!({"success": true, "sent": 0, "count": 0}));
        assert_eq!(connector.sender().verify_calls(), 1);
        assert_eq!(connector.sender().attempts(), 0);
    }

    #[tokio::test]
    async fn test_sender_name_optional() {
        let (server, _state, connector) = setup(RecordingSender::new());

        let mut request = body("a@b.com");
        request.as_object_mut().unwrap().remove("senderName");
        server
            .post("/send")
            .json(&request)
            .await
            .assert_json(&json!({"success": true, "sent": 1, "count": 1}));

        assert_eq!(connector.sender().sent_emails()[0].from_name, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_survives_dropped_request() {
        let connector =
            StaticConnector::new(RecordingSender::new().with_latency(Duration::from_millis(200)));
        let state = AppState::with_connector(config(), Arc::new(connector.clone())).unwrap();

        // Gone after the first of three batches has settled
        let handler = send(State(state.clone()), Ok(Json(request(&recipients(9)))));
        assert!(tokio::time::timeout(Duration::from_millis(300), handler).await.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(connector.sender().sent_count(), 9);
        assert_eq!(state.quota().count("alice@gmail.com"), 9);
        assert!(connector.sender().is_closed());
        assert!(matches!(
            state.quota().check_and_reserve("alice@gmail.com", 20),
            Err(QuotaError::LimitFull { count: 9, remaining: 19, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_cannot_overbook() {
        let connector =
            StaticConnector::new(RecordingSender::new().with_latency(Duration::from_millis(50)));
        let state = AppState::with_connector(config(), Arc::new(connector.clone())).unwrap();
        state.quota().commit("alice@gmail.com", 24);

        let first_request = request("a@b.com, c@d.com, e@f.com");
        let second_request = request("g@h.com, i@j.com, k@l.com");
        let (first, second) = tokio::join!(
            process(&state, &first_request),
            process(&state, &second_request)
        );

        assert_eq!(first, Ok(SendResponse::delivered(3, 27)));
        assert_eq!(
            second,
            Err(SendError::LimitFull {
                count: 24,
                requested: 3,
                remaining: 1
            })
        );
        assert_eq!(connector.sender().sent_count(), 3);
        assert_eq!(state.quota().count("alice@gmail.com"), 27);
    }

    struct FailingConnector;

    impl MailConnector for FailingConnector {
        fn connect(
            &self,
            _credentials: &SenderCredentials,
            _max_concurrency: usize,
        ) -> Result<Arc<dyn EmailSender>, EmailError> {
            Err(EmailError::config("relay host has no TLS name"))
        }
    }

    #[tokio::test]
    async fn test_connector_error_releases_reservation() {
        let state = AppState::with_connector(config(), Arc::new(FailingConnector)).unwrap();
        state.quota().commit("alice@gmail.com", 4);

        let error = process(&state, &request("a@b.com, c@d.com")).await.unwrap_err();

        assert_eq!(error, SendError::WrongCredential { count: 4 });
        let reservation = state.quota().check_and_reserve("alice@gmail.com", 24).unwrap();
        assert_eq!(reservation.remaining(), 24);
        drop(reservation);
    }

    struct MockConnector(Arc<MockEmailSender>);

    impl MailConnector for MockConnector {
        fn connect(
            &self,
            _credentials: &SenderCredentials,
            _max_concurrency: usize,
        ) -> Result<Arc<dyn EmailSender>, EmailError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_verification_failure_never_calls_send() {
        let mut mock = MockEmailSender::new();
        mock.expect_verify()
            .times(1)
            .returning(|| Err(EmailError::verification("535 authentication failed")));
        mock.expect_send().times(0);
        mock.expect_close().times(1).returning(|| ());

        let state =
            AppState::with_connector(config(), Arc::new(MockConnector(Arc::new(mock)))).unwrap();

        let error = process(&state, &request("a@b.com")).await.unwrap_err();
        assert_eq!(error, SendError::WrongCredential { count: 0 });
    }

    #[tokio::test]
    async fn test_wrong_credential_reports_count_at_failure() {
        let tracker_slot = Arc::new(parking_lot::Mutex::new(None::<QuotaTracker>));
        let slot = tracker_slot.clone();
        let mut mock = MockEmailSender::new();
        mock.expect_verify().times(1).returning(move || {
            // Another request for the same identity commits while this one verifies
            let tracker = slot.lock().clone();
            if let Some(tracker) = tracker {
                tracker.commit("alice@gmail.com", 2);
            }
            Err(EmailError::verification("535 authentication failed"))
        });
        mock.expect_close().times(1).returning(|| ());

        let state =
            AppState::with_connector(config(), Arc::new(MockConnector(Arc::new(mock)))).unwrap();
        *tracker_slot.lock() = Some(state.quota().clone());

        let error = process(&state, &request("a@b.com")).await.unwrap_err();
        assert_eq!(error, SendError::WrongCredential { count: 2 });
    }
}
