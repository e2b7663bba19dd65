//! Backend session adapter tests: setup handshake, initial prompt and close,
//! against the mock realtime backend.

mod mock_backend;

use std::time::Duration;

use tokio::time::timeout;

use call_bridge::core::audio::AudioFrame;
use call_bridge::core::realtime::{
    BackendConfig, BackendEvent, BaseRealtime, CloseReason, HandshakeOutcome, HandshakePolicy,
    RealtimeError, RealtimeProvider, WebSocketRealtime,
};

use mock_backend::{AckMode, MockBackend, MockBackendConfig};

fn config_for(mock: &MockBackend, provider: RealtimeProvider) -> BackendConfig {
    let mut config = BackendConfig::new(provider, "test-key");
    config.endpoint = Some(mock.url());
    config.handshake_timeout = Duration::from_secs(2);
    config
}

#[tokio::test]
async fn test_gemini_setup_complete_confirms() {
    let mock = MockBackend::start(MockBackendConfig::gemini()).await;
    let mut connection = WebSocketRealtime
        .open(&config_for(&mock, RealtimeProvider::Gemini))
        .await
        .unwrap();

    assert_eq!(connection.handshake(), &HandshakeOutcome::Confirmed);
    assert_eq!(connection.input_sample_rate(), 16000);
    assert_eq!(connection.output_sample_rate(), 24000);

    let setup = &mock.received()[0]["setup"];
    assert!(setup["model"].as_str().unwrap().starts_with("models/"));
    assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");

    connection.close().await;
    assert!(connection.is_closed());
}

#[tokio::test]
async fn test_openai_session_updated_confirms() {
    let mock = MockBackend::start(MockBackendConfig::openai()).await;
    let mut connection = WebSocketRealtime
        .open(&config_for(&mock, RealtimeProvider::OpenAI))
        .await
        .unwrap();

    assert_eq!(connection.handshake(), &HandshakeOutcome::Confirmed);
    assert_eq!(connection.input_sample_rate(), 24000);

    let update = &mock.received()[0];
    assert_eq!(update["type"], "session.update");
    assert_eq!(update["session"]["input_audio_format"], "pcm16");

    connection.close().await;
}

#[tokio::test]
async fn test_rejected_setup_queues_error_event() {
    let mock = MockBackend::start(MockBackendConfig::gemini().with_ack(AckMode::Reject)).await;
    let mut connection = WebSocketRealtime
        .open(&config_for(&mock, RealtimeProvider::Gemini))
        .await
        .unwrap();

    match connection.handshake() {
        HandshakeOutcome::Rejected(detail) => assert!(detail.contains("model not found")),
        other => panic!("expected rejection, got {other:?}"),
    }

    let mut events = connection.take_events().unwrap();
    match timeout(Duration::from_secs(2), events.next()).await.unwrap() {
        Some(BackendEvent::Error(detail)) => assert!(detail.contains("model not found")),
        other => panic!("expected queued error, got {other:?}"),
    }

    connection.close().await;
}

#[tokio::test]
async fn test_events_before_ack_are_all_delivered() {
    // More than fit in the default event buffer
    let burst = 300;
    let mock = MockBackend::start(MockBackendConfig::gemini().with_early_events(burst)).await;
    let mut connection = WebSocketRealtime
        .open(&config_for(&mock, RealtimeProvider::Gemini))
        .await
        .unwrap();
    assert_eq!(connection.handshake(), &HandshakeOutcome::Confirmed);

    let mut events = connection.take_events().unwrap();
    for index in 0..burst {
        match timeout(Duration::from_secs(2), events.next()).await.unwrap() {
            Some(BackendEvent::Text(text)) => assert_eq!(text, format!("early {index}")),
            other => panic!("expected early text {index}, got {other:?}"),
        }
    }

    connection.close().await;
}

#[tokio::test]
async fn test_openai_rejected_setup() {
    let mock = MockBackend::start(MockBackendConfig::openai().with_ack(AckMode::Reject)).await;
    let mut connection = WebSocketRealtime
        .open(&config_for(&mock, RealtimeProvider::OpenAI))
        .await
        .unwrap();

    assert!(matches!(
        connection.handshake(),
        HandshakeOutcome::Rejected(detail) if detail.contains("model_not_found")
    ));
    connection.close().await;
}

#[tokio::test]
async fn test_silent_backend_times_out_and_continues() {
    let mock = MockBackend::start(MockBackendConfig::gemini().with_ack(AckMode::Silent)).await;
    let mut config = config_for(&mock, RealtimeProvider::Gemini);
    config.handshake_timeout = Duration::from_millis(150);

    let mut connection = WebSocketRealtime.open(&config).await.unwrap();
    assert_eq!(connection.handshake(), &HandshakeOutcome::TimedOut);

    // The session is still usable
    connection
        .send_audio(&AudioFrame::from_samples(&[0i16; 320], 16000))
        .await
        .unwrap();
    assert!(mock.wait_for_audio(1, Duration::from_secs(2)).await);

    connection.close().await;
}

#[tokio::test]
async fn test_abort_policy_fails_open_on_timeout() {
    let mock = MockBackend::start(MockBackendConfig::gemini().with_ack(AckMode::Silent)).await;
    let mut config = config_for(&mock, RealtimeProvider::Gemini);
    config.handshake_timeout = Duration::from_millis(150);
    config.handshake_policy = HandshakePolicy::Abort;

    let result = WebSocketRealtime.open(&config).await;
    match result {
        Err(RealtimeError::HandshakeTimeout(waited)) => {
            assert_eq!(waited, Duration::from_millis(150))
        }
        other => panic!("expected handshake timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_initial_prompt_follows_setup_gemini() {
    let mock = MockBackend::start(MockBackendConfig::gemini()).await;
    let mut config = config_for(&mock, RealtimeProvider::Gemini);
    config.initial_prompt = Some("Hello, introduce yourself.".to_string());

    let mut connection = WebSocketRealtime.open(&config).await.unwrap();
    assert!(mock.wait_for_messages(2, Duration::from_secs(2)).await);

    let received = mock.received();
    assert!(received[0].get("setup").is_some());
    let content = &received[1]["clientContent"];
    assert_eq!(content["turns"][0]["role"], "user");
    assert_eq!(
        content["turns"][0]["parts"][0]["text"],
        "Hello, introduce yourself."
    );
    assert_eq!(content["turnComplete"], true);

    connection.close().await;
}

#[tokio::test]
async fn test_initial_prompt_follows_setup_openai() {
    let mock = MockBackend::start(MockBackendConfig::openai()).await;
    let mut config = config_for(&mock, RealtimeProvider::OpenAI);
    config.initial_prompt = Some("Greet the caller.".to_string());

    let mut connection = WebSocketRealtime.open(&config).await.unwrap();
    assert!(mock.wait_for_messages(3, Duration::from_secs(2)).await);

    let received = mock.received();
    assert_eq!(received[1]["type"], "conversation.item.create");
    assert_eq!(received[1]["item"]["content"][0]["text"], "Greet the caller.");
    assert_eq!(received[2]["type"], "response.create");

    connection.close().await;
}

#[tokio::test]
async fn test_send_audio_rejects_wrong_rate() {
    let mock = MockBackend::start(MockBackendConfig::gemini()).await;
    let mut connection = WebSocketRealtime
        .open(&config_for(&mock, RealtimeProvider::Gemini))
        .await
        .unwrap();

    let result = connection
        .send_audio(&AudioFrame::from_samples(&[0i16; 160], 8000))
        .await;
    assert!(matches!(result, Err(RealtimeError::InvalidFrame(_))));

    let result = connection
        .send_audio(&AudioFrame::mulaw(vec![0xFFu8; 320], 16000))
        .await;
    assert!(matches!(result, Err(RealtimeError::InvalidFrame(_))));

    connection.close().await;
}

#[tokio::test]
async fn test_close_is_idempotent_and_ends_events() {
    let mock = MockBackend::start(MockBackendConfig::gemini()).await;
    let mut connection = WebSocketRealtime
        .open(&config_for(&mock, RealtimeProvider::Gemini))
        .await
        .unwrap();
    let mut events = connection.take_events().unwrap();
    assert!(connection.take_events().is_none());

    connection.close().await;
    connection.close().await;
    assert!(connection.is_closed());

    let last = timeout(Duration::from_secs(2), events.next()).await.unwrap();
    assert!(matches!(
        last,
        Some(BackendEvent::Closed(CloseReason::Local))
    ));
    assert!(events.next().await.is_none());

    let result = connection
        .send_audio(&AudioFrame::from_samples(&[0i16; 320], 16000))
        .await;
    assert!(matches!(result, Err(RealtimeError::ConnectionClosed)));
}

#[tokio::test]
async fn test_missing_api_key_fails_before_connecting() {
    let mock = MockBackend::start(MockBackendConfig::gemini()).await;
    let mut config = config_for(&mock, RealtimeProvider::Gemini);
    config.api_key = String::new();

    let result = WebSocketRealtime.open(&config).await;
    assert!(matches!(result, Err(RealtimeError::AuthenticationFailed(_))));
    assert_eq!(mock.connections(), 0);
}
