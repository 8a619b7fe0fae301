use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use msgate_core::{
    AfricasTalkingAdapter, DeliveryState, HttpError, HttpResponse, KairosAdapter, MockAdapter,
    ProviderAdapter, ProviderCapabilities, RetryConfig, ScriptedHttpClient, SendOptions,
    SendStatus, TwilioAdapter,
};

#[derive(Clone, Copy, Debug)]
enum Kind {
    Kairos,
    AfricasTalking,
    Twilio,
}

impl Kind {
    const ALL: [Kind; 3] = [Kind::Kairos, Kind::AfricasTalking, Kind::Twilio];

    fn name(self) -> &'static str {
        match self {
            Self::Kairos => "kairos",
            Self::AfricasTalking => "africastalking",
            Self::Twilio => "twilio",
        }
    }

    fn accepted_response(self) -> HttpResponse {
        match self {
            Self::Kairos => HttpResponse::ok_json(
                r#"{"success":true,"message":"Message sent","data":{"id":"kr-1"}}"#,
            ),
            Self::AfricasTalking => HttpResponse::new(
                201,
                r#"{"SMSMessageData":{"Message":"Sent to 1/1","Recipients":[{"statusCode":101,"number":"+233244123456","status":"Success","cost":"GHS 0.0300","messageId":"ATXid_1"}]}}"#,
            ),
            Self::Twilio => HttpResponse::new(
                201,
                r#"{"sid":"SM1","status":"queued","price":null,"price_unit":"USD"}"#,
            ),
        }
    }

    fn balance_response(self) -> HttpResponse {
        match self {
            Self::Kairos => HttpResponse::ok_json(
                r#"{"success":true,"data":{"balance":50.0,"currency":"GHS"}}"#,
            ),
            Self::AfricasTalking => {
                HttpResponse::ok_json(r#"{"UserData":{"balance":"GHS 50.00"}}"#)
            }
            Self::Twilio => HttpResponse::ok_json(r#"{"balance":"50.00","currency":"USD"}"#),
        }
    }

    fn adapter(self, client: Arc<ScriptedHttpClient>) -> Arc<dyn ProviderAdapter> {
        let capabilities =
            ProviderCapabilities::new(self.name(), ["GH"]).expect("valid capabilities");
        match self {
            Self::Kairos => Arc::new(
                KairosAdapter::new(capabilities, client, "key", "secret")
                    .with_base_url("https://kairos.test")
                    .with_retry(RetryConfig::no_retry()),
            ),
            Self::AfricasTalking => Arc::new(
                AfricasTalkingAdapter::new(capabilities, client, "gateway", "key")
                    .with_base_url("https://at.test")
                    .with_retry(RetryConfig::no_retry()),
            ),
            Self::Twilio => Arc::new(
                TwilioAdapter::new(capabilities, client, "AC1", "token")
                    .with_base_url("https://twilio.test")
                    .with_retry(RetryConfig::no_retry()),
            ),
        }
    }
}

fn options() -> SendOptions {
    SendOptions::new("+233244123456", "Your code is 1234", "MSGATE")
}

#[test]
fn accepted_send_reports_adapter_name_and_records_stats() {
    for kind in Kind::ALL {
        let client = Arc::new(ScriptedHttpClient::new().with_response(kind.accepted_response()));
        let adapter = kind.adapter(Arc::clone(&client));

        let outcome = block_on(adapter.send(options()));

        assert!(outcome.success, "provider '{}': success", kind.name());
        assert_eq!(outcome.provider_id, kind.name(), "provider '{}': id", kind.name());
        assert!(
            outcome.external_id.is_some(),
            "provider '{}': external id",
            kind.name()
        );
        assert!(
            outcome.latency_ms.is_some(),
            "provider '{}': latency stamped",
            kind.name()
        );
        assert_eq!(client.request_count(), 1, "provider '{}': one call", kind.name());

        let stats = adapter.stats().snapshot();
        assert_eq!(stats.total_sent, 1, "provider '{}': attempts", kind.name());
        assert_eq!(stats.total_delivered, 1, "provider '{}': delivered", kind.name());
        assert_eq!(stats.success_rate, 100.0, "provider '{}': rate", kind.name());
    }
}

#[test]
fn invalid_recipient_fails_locally_without_network_call() {
    for kind in Kind::ALL {
        let client = Arc::new(ScriptedHttpClient::new());
        let adapter = kind.adapter(Arc::clone(&client));

        let outcome = block_on(adapter.send(SendOptions::new("not-a-number", "hello", "MSGATE")));

        assert!(!outcome.success, "provider '{}'", kind.name());
        assert_eq!(
            outcome.status,
            SendStatus::InvalidParameters,
            "provider '{}': status",
            kind.name()
        );
        assert_eq!(client.request_count(), 0, "provider '{}': no call", kind.name());
        assert_eq!(
            adapter.stats().snapshot().total_failed,
            1,
            "provider '{}': failure recorded",
            kind.name()
        );
    }
}

#[test]
fn empty_message_fails_locally() {
    for kind in Kind::ALL {
        let client = Arc::new(ScriptedHttpClient::new());
        let adapter = kind.adapter(Arc::clone(&client));

        let outcome = block_on(adapter.send(SendOptions::new("+233244123456", "   ", "MSGATE")));

        assert_eq!(
            outcome.status,
            SendStatus::InvalidParameters,
            "provider '{}'",
            kind.name()
        );
        assert_eq!(client.request_count(), 0, "provider '{}'", kind.name());
    }
}

#[test]
fn transport_failure_is_an_outcome_not_an_error() {
    for kind in Kind::ALL {
        let client =
            Arc::new(ScriptedHttpClient::new().with_error(HttpError::new("connection reset")));
        let adapter = kind.adapter(client);

        let outcome = block_on(adapter.send(options()));

        assert!(!outcome.success, "provider '{}'", kind.name());
        assert_eq!(
            outcome.status,
            SendStatus::ProviderError,
            "provider '{}': status",
            kind.name()
        );
        assert!(
            outcome.error_code.is_none(),
            "provider '{}': generic transport failures carry no code",
            kind.name()
        );
    }
}

#[test]
fn malformed_success_body_is_provider_error() {
    for kind in Kind::ALL {
        let client =
            Arc::new(ScriptedHttpClient::new().with_response(HttpResponse::ok_json("<html>")));
        let adapter = kind.adapter(client);

        let outcome = block_on(adapter.send(options()));

        assert!(!outcome.success, "provider '{}'", kind.name());
        assert_eq!(
            outcome.status,
            SendStatus::ProviderError,
            "provider '{}'",
            kind.name()
        );
    }
}

#[test]
fn unknown_message_lookup_never_fails() {
    for kind in Kind::ALL {
        let client = Arc::new(
            ScriptedHttpClient::new().with_response(HttpResponse::new(404, r#"{"message":"nope"}"#)),
        );
        let adapter = kind.adapter(client);

        let status = block_on(adapter.delivery_status("missing-id"));

        assert_eq!(
            status.status,
            DeliveryState::Unknown,
            "provider '{}'",
            kind.name()
        );
        assert_eq!(status.external_id, "missing-id", "provider '{}'", kind.name());
        assert!(status.error.is_some(), "provider '{}': explanation", kind.name());
    }
}

#[test]
fn balance_check_returns_amount_and_currency() {
    for kind in Kind::ALL {
        let client = Arc::new(ScriptedHttpClient::new().with_response(kind.balance_response()));
        let adapter = kind.adapter(client);

        let balance = block_on(adapter.check_balance()).unwrap_or_else(|error| {
            panic!("provider '{}' balance failed: {error}", kind.name())
        });

        assert_eq!(balance.amount, 50.0, "provider '{}'", kind.name());
        assert!(!balance.currency.is_empty(), "provider '{}'", kind.name());
    }
}

#[test]
fn mock_adapter_honours_the_same_contract() {
    let adapter = MockAdapter::new(ProviderCapabilities::new("mock", ["*"]).expect("valid"));

    let outcome = block_on(adapter.send(options()));
    let status = block_on(adapter.delivery_status("missing-id"));

    assert!(outcome.success);
    assert_eq!(outcome.provider_id, "mock");
    assert_eq!(adapter.stats().snapshot().total_sent, 1);
    assert_eq!(status.status, DeliveryState::Unknown);
    assert!(block_on(adapter.check_balance()).is_ok());
}

fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    let waker = noop_waker();
    let mut context = Context::from_waker(&waker);
    let mut future = std::pin::pin!(future);

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::yield_now(),
        }
    }
}

fn noop_waker() -> Waker {
    // SAFETY: The vtable functions never dereference the data pointer and are no-op operations.
    unsafe { Waker::from_raw(noop_raw_waker()) }
}

fn noop_raw_waker() -> RawWaker {
    RawWaker::new(std::ptr::null(), &NOOP_RAW_WAKER_VTABLE)
}

unsafe fn noop_raw_waker_clone(_: *const ()) -> RawWaker {
    noop_raw_waker()
}

unsafe fn noop_raw_waker_wake(_: *const ()) {}

unsafe fn noop_raw_waker_wake_by_ref(_: *const ()) {}

unsafe fn noop_raw_waker_drop(_: *const ()) {}

static NOOP_RAW_WAKER_VTABLE: RawWakerVTable = RawWakerVTable::new(
    noop_raw_waker_clone,
    noop_raw_waker_wake,
    noop_raw_waker_wake_by_ref,
    noop_raw_waker_drop,
);
