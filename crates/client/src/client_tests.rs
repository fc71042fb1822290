use serde_json::json;

use super::*;
use crate::session::{Session, API_KEY_HEADER, COOKIE_HEADER};
use crate::test_fixtures::{endpoint, FakeTransport};

fn client_with(transport: &Arc<FakeTransport>, session: Session) -> Client {
    Client::with_transport(transport.clone(), session)
}

fn stream_body() -> Vec<u8> {
    [
        json!(["init", {"tick": 10, "text": "inet:fqdn", "task": "t1"}]),
        json!(["node", [[["inet:fqdn", "vertex.link"]], {"iden": "n1", "props": {"zone": "link"}}]]),
        json!(["warn", {"mesg": "slow"}]),
        json!(["node", [[["inet:fqdn", "woot.com"]], {"iden": "n2"}]]),
        json!(["fini", {"tock": 20, "took": 10, "count": 2}]),
    ]
    .iter()
    .flat_map(|value| serde_json::to_vec(value).expect("encode failed"))
    .collect()
}

// ---------------------------------------------------------------------------
// run_query
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_query_sends_body_with_session_and_decodes_stream() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(stream_body());
    let client = client_with(&transport, Session::with_api_key(endpoint(), "k3y"));

    let stream = client
        .run_query(&QueryRequest::new("inet:fqdn").with_view("v1"))
        .await
        .expect("query failed");

    assert_eq!(stream.inits.len(), 1);
    assert_eq!(stream.inits[0].task, "t1");
    assert_eq!(
        stream.nodes.iter().map(|n| n.info.iden.as_str()).collect::<Vec<_>>(),
        ["n1", "n2"]
    );
    assert_eq!(stream.result_count(), 2);

    let request = transport.last_request();
    assert_eq!(request.method, reqwest::Method::GET);
    assert_eq!(request.path, STORM_PATH);
    assert_eq!(request.header(API_KEY_HEADER), Some("k3y"));
    let body: Value =
        serde_json::from_slice(request.body.as_deref().expect("no body")).expect("not JSON");
    assert_eq!(
        body,
        json!({"query": "inet:fqdn", "opts": {"view": "v1"}, "stream": "jsonlines"})
    );
}

#[tokio::test]
async fn run_query_carries_login_cookie() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond_with_cookie(r#"{"status":"ok","result":{}}"#, "sess=abc123");
    transport.respond(Vec::<u8>::new());
    let client = client_with(&transport, Session::new(endpoint()));

    client.login("visi", "secret").await.expect("login failed");
    let stream = client
        .run_query(&QueryRequest::new("inet:fqdn"))
        .await
        .expect("query failed");

    assert!(stream.is_empty());
    assert_eq!(
        transport.last_request().header(COOKIE_HEADER),
        Some("sess=abc123")
    );
}

#[tokio::test]
async fn non_success_status_short_circuits_before_decoding() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond_with(502, None, vec![b"<html>bad gateway</html>".to_vec()]);
    let client = client_with(&transport, Session::new(endpoint()));

    let err = client
        .run_query(&QueryRequest::new("inet:fqdn"))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            ClientError::Transport(TransportError::Status { status: 502 })
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn transport_failure_is_surfaced() {
    let transport = Arc::new(FakeTransport::new());
    transport.fail("tls handshake failed");
    let client = client_with(&transport, Session::new(endpoint()));

    let err = client
        .run_query(&QueryRequest::new("inet:fqdn"))
        .await
        .unwrap_err();

    assert!(err.is_transport(), "got {err:?}");
}

#[tokio::test]
async fn malformed_stream_is_surfaced_with_offset() {
    let transport = Arc::new(FakeTransport::new());
    let mut body = serde_json::to_vec(&json!(["init", {}])).expect("encode failed");
    let good_len = body.len();
    body.extend_from_slice(b"[\"node\", nope]");
    transport.respond(body);
    let client = client_with(&transport, Session::new(endpoint()));

    let err = client
        .run_query(&QueryRequest::new("inet:fqdn"))
        .await
        .unwrap_err();

    match err {
        ClientError::Malformed(malformed) => assert_eq!(malformed.offset, Some(good_len)),
        other => panic!("expected malformed response, got {other:?}"),
    }
}

#[tokio::test]
async fn strict_payload_mode_is_applied_to_queries() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(br#"["fini",{"count":"lots"}]"#.to_vec());
    let client = client_with(&transport, Session::new(endpoint()))
        .with_payload_mode(PayloadMode::Strict);

    let err = client
        .run_query(&QueryRequest::new("inet:fqdn"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Malformed(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// run_query_each
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_query_each_delivers_frames_in_stream_order_across_chunks() {
    let transport = Arc::new(FakeTransport::new());
    let body = stream_body();
    let chunks = body.chunks(7).map(<[u8]>::to_vec).collect();
    transport.respond_with(200, None, chunks);
    let client = client_with(&transport, Session::new(endpoint()));

    let mut tags = Vec::new();
    let delivered = client
        .run_query_each(&QueryRequest::new("inet:fqdn"), |frame| tags.push(frame.tag()))
        .await
        .expect("query failed");

    assert_eq!(delivered, 4);
    assert_eq!(tags, ["init", "node", "node", "fini"]);
}

#[tokio::test]
async fn run_query_each_reports_truncated_stream() {
    let transport = Arc::new(FakeTransport::new());
    let mut body = stream_body();
    body.truncate(body.len() - 3);
    transport.respond_with(200, None, vec![body]);
    let client = client_with(&transport, Session::new(endpoint()));

    let mut seen = 0;
    let err = client
        .run_query_each(&QueryRequest::new("inet:fqdn"), |_| seen += 1)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Malformed(_)), "got {err:?}");
    assert_eq!(seen, 3);
}

// ---------------------------------------------------------------------------
// Envelope calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn storm_call_posts_query_and_returns_result() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(r#"{"status":"ok","result":1}"#);
    let client = client_with(&transport, Session::with_api_key(endpoint(), "k3y"));

    let opts = BTreeMap::from([("view".to_string(), json!("v1"))]);
    let result = client.storm_call("return(1)", opts).await.expect("call failed");

    assert_eq!(result, json!(1));
    let request = transport.last_request();
    assert_eq!(request.method, reqwest::Method::POST);
    assert_eq!(request.path, STORM_CALL_PATH);
    let body: Value =
        serde_json::from_slice(request.body.as_deref().expect("no body")).expect("not JSON");
    assert_eq!(body, json!({"query": "return(1)", "opts": {"view": "v1"}}));
}

#[tokio::test]
async fn envelope_failure_is_service_error_despite_http_200() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(r#"{"status":"err","code":"BadSyntax","mesg":"unexpected token"}"#);
    let client = client_with(&transport, Session::new(endpoint()));

    let err = client.core_info().await.unwrap_err();

    match err {
        ClientError::Service(service) => {
            assert_eq!(service.code, "BadSyntax");
            assert_eq!(service.message, "unexpected token");
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[tokio::test]
async fn envelope_calls_ignore_http_status() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond_with(
        500,
        None,
        vec![br#"{"status":"ok","result":{"version":[2,150,0]}}"#.to_vec()],
    );
    let client = client_with(&transport, Session::new(endpoint()));

    let info = client.core_info().await.expect("call failed");

    assert_eq!(info["version"], json!([2, 150, 0]));
}
