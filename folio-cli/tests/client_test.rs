use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use folio_cli::{ChatSession, RelayClient, Sender, TurnEvent, TurnState, FALLBACK_REPLY};
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn delta(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
    )
}

async fn spawn_relay(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/chat", addr)
}

fn streaming_relay(chunks: Vec<String>) -> Router {
    Router::new().route(
        "/api/chat",
        post(move || {
            let chunks = chunks.clone();
            async move {
                let frames = stream::iter(
                    chunks
                        .into_iter()
                        .map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk))),
                );
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    Body::from_stream(frames),
                )
                    .into_response()
            }
        }),
    )
}

/// Feeds every event into `session` and returns the terminal one.
async fn drain(session: &mut ChatSession, mut events: UnboundedReceiver<TurnEvent>) -> TurnEvent {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("turn did not finish")
            .expect("channel closed without a terminal event");
        let terminal = event.is_terminal();
        session.apply(event.clone());
        if terminal {
            assert!(events.recv().await.is_none(), "events after terminal");
            return event;
        }
    }
}

async fn run_turn(url: String, prompt: &str) -> (ChatSession, TurnEvent) {
    let mut session = ChatSession::new("persona", 20);
    let request = session.begin_turn(prompt).unwrap();
    let events = RelayClient::new(url).stream_turn(request, CancellationToken::new());
    let terminal = drain(&mut session, events).await;
    (session, terminal)
}

#[tokio::test]
async fn renders_deltas_up_to_done() {
    let url = spawn_relay(streaming_relay(vec![
        delta("Hel"),
        format!("{}data: [DONE]\n\n{}", delta("lo"), delta(" ignored")),
    ]))
    .await;

    let (session, terminal) = run_turn(url, "hi").await;

    assert_eq!(terminal, TurnEvent::Done);
    let last = session.entries().last().unwrap();
    assert_eq!(last.sender, Sender::Bot);
    assert_eq!(last.text, "Hello");
    assert!(session.input_enabled());
}

#[tokio::test]
async fn reassembles_records_split_across_reads() {
    let body = format!("{}{}data: [DONE]\n\n", delta("Café "), delta("au lait"));
    let bytes = body.into_bytes();
    // Split inside the JSON and inside the two-byte 'é'.
    let cut = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
    let frames: Vec<Vec<u8>> = vec![
        bytes[..10].to_vec(),
        bytes[10..cut].to_vec(),
        bytes[cut..].to_vec(),
    ];
    let app = Router::new().route(
        "/api/chat",
        post(move || {
            let frames = frames.clone();
            async move {
                let body = Body::from_stream(stream::iter(
                    frames.into_iter().map(|f| Ok::<_, Infallible>(Bytes::from(f))),
                ));
                ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
            }
        }),
    );

    let (session, terminal) = run_turn(spawn_relay(app).await, "coffee?").await;
    assert_eq!(terminal, TurnEvent::Done);
    assert_eq!(session.entries().last().unwrap().text, "Café au lait");
}

#[tokio::test]
async fn skips_malformed_record() {
    let url = spawn_relay(streaming_relay(vec![
        delta("Hel"),
        "data: {not json\n\n".to_string(),
        delta("lo"),
        "data: [DONE]\n\n".to_string(),
    ]))
    .await;

    let (session, terminal) = run_turn(url, "hi").await;
    assert_eq!(terminal, TurnEvent::Done);
    assert_eq!(session.entries().last().unwrap().text, "Hello");
}

#[tokio::test]
async fn stream_end_without_sentinel_completes_turn() {
    let url = spawn_relay(streaming_relay(vec![delta("partial")])).await;

    let (session, terminal) = run_turn(url, "hi").await;
    assert_eq!(terminal, TurnEvent::Done);
    assert_eq!(session.entries().last().unwrap().text, "partial");
    assert!(session.input_enabled());
}

#[tokio::test]
async fn unreachable_relay_shows_fallback() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (session, terminal) = run_turn(format!("http://{}/api/chat", addr), "hi").await;

    assert!(matches!(terminal, TurnEvent::Failed(_)));
    assert_eq!(session.entries().last().unwrap().text, FALLBACK_REPLY);
    assert_eq!(session.state(), TurnState::Idle);
    assert!(session.input_enabled());
}

#[tokio::test]
async fn error_status_shows_fallback() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(serde_json::json!({ "error": "Server configuration error." })),
            )
                .into_response()
        }),
    );

    let (session, terminal) = run_turn(spawn_relay(app).await, "hi").await;

    assert!(matches!(terminal, TurnEvent::Failed(_)));
    assert_eq!(session.entries().last().unwrap().text, FALLBACK_REPLY);
    assert!(session.input_enabled());
}

#[tokio::test]
async fn cancel_stops_a_stalled_stream() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async {
            let frames = stream::iter(vec![Ok::<_, Infallible>(Bytes::from(delta("Hel")))])
                .chain(stream::pending());
            let body = Body::from_stream(frames);
            let response: Response =
                ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response();
            response
        }),
    );
    let url = spawn_relay(app).await;

    let mut session = ChatSession::new("persona", 20);
    let request = session.begin_turn("hi").unwrap();
    let cancel = CancellationToken::new();
    let mut events = RelayClient::new(url).stream_turn(request, cancel.clone());

    loop {
        let event = timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        let is_delta = matches!(event, TurnEvent::Delta(_));
        session.apply(event);
        if is_delta {
            break;
        }
    }
    assert!(!session.input_enabled());

    cancel.cancel();
    let terminal = drain(&mut session, events).await;

    assert_eq!(terminal, TurnEvent::Cancelled);
    assert_eq!(session.entries().last().unwrap().text, "Hel");
    assert!(session.input_enabled());
}
