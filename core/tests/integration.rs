//! End-to-end tests: the real client engine (mio transport, raw HTTP/1.0
//! messages) against the live mock server.
//!
//! Each test starts its own server on a random port: the std listener is
//! bound first so connections queue before the acceptor thread is up, then
//! handed to a current-thread tokio runtime.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use restmux_core::{
    CallOptions, Client, ClientConfig, Endpoint, MemoryCache, Method, Scheme,
};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> Client {
    let mut config = ClientConfig::new(Endpoint::new(Scheme::Http, "127.0.0.1", addr.port()));
    config.timeout_secs = 10;
    Client::new(config)
}

fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn get_json_success_is_decoded() {
    let addr = start_server();
    let mut client = client_for(addr);

    let (request, response) = client
        .call("/slow/0", Method::Get, CallOptions::default())
        .unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(response.status, 200);
    assert_eq!(response.decoded.as_ref().unwrap()["ok"], true);
}

#[test]
fn post_form_fields_echo_back() {
    let addr = start_server();
    let mut client = client_for(addr);

    let (_, response) = client
        .call(
            "/echo",
            Method::Post,
            CallOptions {
                data: fields(&[("name", "bolt"), ("qty", "2")]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(response.status, 200);
    let decoded = response.decoded.as_ref().unwrap();
    assert_eq!(decoded["name"], "bolt");
    assert_eq!(decoded["qty"], "2");
}

#[test]
fn not_found_is_downgraded_to_plain_text() {
    let addr = start_server();
    let mut client = client_for(addr);

    let (_, response) = client
        .call("/status/404", Method::Get, CallOptions::default())
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body, b"Not Found");
    assert_eq!(response.header("content-type"), Some("text/plain"));
}

#[test]
fn server_errors_come_back_as_classified_responses() {
    let addr = start_server();
    let mut client = client_for(addr);

    let (_, response) = client
        .call("/status/500", Method::Get, CallOptions::default())
        .unwrap();
    assert_eq!(response.status, 500);
    assert!(response.decoded.is_none(), "errors are not decoded");
}

#[test]
fn client_errors_keep_their_status_and_raw_body() {
    let addr = start_server();
    let mut client = client_for(addr);

    let (_, response) = client
        .call("/status/418", Method::Get, CallOptions::default())
        .unwrap();
    assert_eq!(response.status, 418);
    assert_eq!(response.body_text(), "status 418");
    assert!(response.decoded.is_none());
}

#[test]
fn cache_hit_skips_the_server() {
    let addr = start_server();
    let mut config = ClientConfig::new(Endpoint::new(Scheme::Http, "127.0.0.1", addr.port()));
    config.timeout_secs = 10;
    config.cache_by_default = true;
    let mut client = Client::new(config).with_cache(Box::new(MemoryCache::new()));

    let (_, first) = client
        .call("/count", Method::Get, CallOptions::default())
        .unwrap();
    assert_eq!(first.decoded.as_ref().unwrap()["count"], 1);

    // Served from cache: the server-side counter must not move.
    let (_, second) = client
        .call("/count", Method::Get, CallOptions::default())
        .unwrap();
    assert_eq!(second.decoded.as_ref().unwrap()["count"], 1);

    // An explicit cache opt-out reaches the server again.
    let (_, third) = client
        .call(
            "/count",
            Method::Get,
            CallOptions {
                cache: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(third.decoded.as_ref().unwrap()["count"], 2);
}

#[test]
fn concurrent_calls_all_complete_in_one_run() {
    let addr = start_server();
    let mut client = client_for(addr);

    let started = Instant::now();
    let results = client.call_many(vec![
        ("/slow/200".to_string(), Method::Get, CallOptions::default()),
        ("/slow/100".to_string(), Method::Get, CallOptions::default()),
        ("/slow/0".to_string(), Method::Get, CallOptions::default()),
    ]);
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 3);
    for result in results {
        let (request, response) = result.unwrap();
        assert_eq!(response.status, 200, "{}", request.action);
        let expected: u64 = request.action.rsplit('/').next().unwrap().parse().unwrap();
        assert_eq!(response.decoded.as_ref().unwrap()["delayed_ms"], expected);
    }
    assert!(
        elapsed < Duration::from_secs(2),
        "requests must overlap, got {elapsed:?}"
    );
}
