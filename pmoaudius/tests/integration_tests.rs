//! Integration tests for pmoaudius against mocked nodes

use pmoaudius::{AudiusClient, Track};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP: &str = "test-app";

/// Registry answering with the given node list
async fn registry_with(nodes: &[&str]) -> MockServer {
    let registry = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": nodes })))
        .mount(&registry)
        .await;
    registry
}

async fn client_for(registry: &MockServer, fallbacks: &[&str]) -> AudiusClient {
    AudiusClient::builder()
        .app_name(APP)
        .discovery_url(format!("{}/", registry.uri()))
        .fallback_nodes(fallbacks.iter().copied())
        .build()
        .await
        .unwrap()
}

fn search_body() -> serde_json::Value {
    json!({
        "data": [
            {
                "id": "D7KyD",
                "title": "Night Drive",
                "permalink": "/synth/night-drive",
                "user": { "name": "Synth", "handle": "synth" },
                "artwork": { "480x480": "https://art/480.jpg" }
            },
            {
                "id": "Qx9",
                "title": "Untitled"
            }
        ]
    })
}

// ============================================================================
// NodeDirectory
// ============================================================================

#[tokio::test]
async fn test_registry_first_candidate_is_cached() {
    let registry = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": ["https://node-1.example/", "https://node-2.example"]
        })))
        .expect(1)
        .mount(&registry)
        .await;

    let client = client_for(&registry, &["https://static.example"]).await;
    let directory = client.directory();

    assert_eq!(directory.resolve_base(false).await, "https://node-1.example");
    assert_eq!(directory.resolve_base(false).await, "https://node-1.example");
    assert_eq!(directory.current_base().as_deref(), Some("https://node-1.example"));
}

#[tokio::test]
async fn test_force_refresh_queries_registry_again() {
    let registry = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": ["https://a.example"] })))
        .up_to_n_times(1)
        .mount(&registry)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": ["https://b.example"] })))
        .mount(&registry)
        .await;

    let client = client_for(&registry, &["https://static.example"]).await;

    assert_eq!(client.directory().resolve_base(false).await, "https://a.example");
    assert_eq!(client.directory().resolve_base(true).await, "https://b.example");
    assert_eq!(client.directory().resolve_base(false).await, "https://b.example");
}

#[tokio::test]
async fn test_registry_failures_fall_back_to_first_static_node() {
    let failures = [
        ResponseTemplate::new(503),
        ResponseTemplate::new(200).set_body_json(json!({ "data": [] })),
        ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
        ResponseTemplate::new(200).set_body_json(json!({ "data": ["  "] })),
    ];

    for response in failures {
        let registry = MockServer::start().await;
        Mock::given(any())
            .respond_with(response)
            .mount(&registry)
            .await;

        let client =
            client_for(&registry, &["https://static-1.example", "https://static-2.example"]).await;
        assert_eq!(
            client.directory().resolve_base(false).await,
            "https://static-1.example"
        );
        assert_eq!(
            client.directory().current_base().as_deref(),
            Some("https://static-1.example")
        );
    }
}

#[tokio::test]
async fn test_unreachable_registry_falls_back() {
    let client = AudiusClient::builder()
        .discovery_url("http://127.0.0.1:9/")
        .fallback_nodes(["https://static.example"])
        .build()
        .await
        .unwrap();

    assert_eq!(
        client.directory().resolve_base(false).await,
        "https://static.example"
    );
}

// ============================================================================
// TrackSearchService
// ============================================================================

#[tokio::test]
async fn test_blank_query_makes_no_request() {
    let registry = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&registry)
        .await;

    let client = client_for(&registry, &[registry.uri().as_str()]).await;

    for query in ["", " ", "\t\n  "] {
        assert!(client.search().search(query, true).await.is_empty());
        assert!(client.search().search(query, false).await.is_empty());
    }
}

#[tokio::test]
async fn test_search_maps_records() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .and(query_param("query", "night drive"))
        .and(query_param("app_name", APP))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    let tracks = client.search().search("night drive", false).await;

    assert_eq!(tracks.len(), 2);
    assert_eq!(
        tracks[0],
        Track {
            id: "D7KyD".into(),
            title: "Night Drive".into(),
            artist: Some("Synth".into()),
            artwork_url: Some("https://art/480.jpg".into()),
            permalink: "/synth/night-drive".into(),
        }
    );
    assert_eq!(tracks[1].artist, None);
    assert_eq!(tracks[1].artwork_url, None);
}

#[tokio::test]
async fn test_identical_cached_searches_hit_network_once() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    let first = client.search().search("synth", true).await;
    let second = client.search().search("synth", true).await;

    assert_eq!(first, second);
    assert_eq!(client.search().cached_queries().await, 1);
}

#[tokio::test]
async fn test_uncached_searches_always_hit_network() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(2)
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    client.search().search("synth", false).await;
    client.search().search("synth", false).await;
    assert_eq!(client.search().cached_queries().await, 0);
}

#[tokio::test]
async fn test_failed_search_is_empty_and_not_cached() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&node)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    assert!(client.search().search("synth", true).await.is_empty());
    assert_eq!(client.search().search("synth", true).await.len(), 2);
}

#[tokio::test]
async fn test_cached_search_expires_after_ttl() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(2)
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = AudiusClient::builder()
        .app_name(APP)
        .discovery_url(format!("{}/", registry.uri()))
        .search_cache_ttl(Duration::from_millis(200))
        .build()
        .await
        .unwrap();

    assert_eq!(client.search().search("synth", true).await.len(), 2);
    assert_eq!(client.search().search("synth", true).await.len(), 2);

    // moka keeps its own clock, so real time has to pass
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(client.search().search("synth", true).await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_identical_searches_share_one_request() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_body())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    let (first, second) = tokio::join!(
        client.search().search("synth", true),
        client.search().search("synth", true),
    );

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_search_uses_static_node_when_registry_is_down() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .mount(&node)
        .await;
    let registry = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(502))
        .mount(&registry)
        .await;

    let client = client_for(&registry, &[node.uri().as_str()]).await;
    assert_eq!(client.search_tracks("synth").await.len(), 2);
}

// ============================================================================
// StreamUrlResolver
// ============================================================================

#[tokio::test]
async fn test_content_url_is_returned_without_network() {
    let registry = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&registry)
        .await;
    let client = client_for(&registry, &[]).await;

    let url = "https://creatornode.audius.co/tracks/cidstream/QmAbc?signature=xyz";
    assert_eq!(client.resolver().resolve_stream_url(url, 3).await, url);
}

#[tokio::test]
async fn test_stream_payload_shapes() {
    let cases = [
        (json!({ "data": "https://cdn/x.mp3" }), "https://cdn/x.mp3"),
        (json!({ "url": "https://cdn/u.mp3" }), "https://cdn/u.mp3"),
        (
            json!({ "data": [{ "url": "https://cdn/a.mp3" }, { "url": "https://cdn/b.mp3" }] }),
            "https://cdn/a.mp3",
        ),
        (json!("https://cdn/plain.mp3"), "https://cdn/plain.mp3"),
    ];

    for (body, expected) in cases {
        let node = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tracks/abc/stream"))
            .and(query_param("app_name", APP))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&node)
            .await;
        let registry = registry_with(&[node.uri().as_str()]).await;
        let client = client_for(&registry, &[]).await;

        assert_eq!(client.resolver().resolve_stream_url("abc", 3).await, expected);
    }
}

#[tokio::test]
async fn test_raw_text_stream_answer() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string("https://cdn/raw.mp3"))
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    assert_eq!(client.stream_url("abc").await, "https://cdn/raw.mp3");
}

#[tokio::test]
async fn test_redirect_to_audio_resolves_without_reading_body() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc/stream"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/content/abc.mp3", node.uri()).as_str()),
        )
        .expect(1)
        .mount(&node)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/abc.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 1 << 20], "audio/mpeg"))
        .expect(1)
        .mount(&node)
        .await;

    let registry = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [node.uri()] })))
        // a media answer is a success: no forced refresh
        .expect(1)
        .mount(&registry)
        .await;

    let client = client_for(&registry, &[]).await;

    assert_eq!(
        client.resolver().resolve_stream_url("abc", 3).await,
        format!("{}/content/abc.mp3", node.uri())
    );
}

#[tokio::test]
async fn test_json_string_error_is_not_a_stream_url() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("Track not found")))
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    assert_eq!(
        client.resolver().resolve_stream_url("abc", 1).await,
        format!("{}/v1/tracks/abc/stream?app_name={}", node.uri(), APP)
    );
}

#[tokio::test]
async fn test_failed_lookup_rotates_to_fresh_node() {
    let dead = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&dead)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc/stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "url": "https://cdn/ok.mp3" })),
        )
        .expect(1)
        .mount(&healthy)
        .await;

    let registry = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [dead.uri()] })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&registry)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [healthy.uri()] })))
        .expect(1)
        .mount(&registry)
        .await;

    let client = client_for(&registry, &[]).await;

    assert_eq!(
        client.resolver().resolve_stream_url("abc", 3).await,
        "https://cdn/ok.mp3"
    );
    assert_eq!(client.directory().current_base(), Some(healthy.uri()));
}

#[tokio::test]
async fn test_exhausted_retries_return_fallback_url() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .expect(3)
        .mount(&node)
        .await;

    let registry = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [node.uri()] })))
        // first resolution plus one forced refresh per retry
        .expect(3)
        .mount(&registry)
        .await;

    let client = client_for(&registry, &[]).await;

    assert_eq!(
        client.resolver().resolve_stream_url("abc", 3).await,
        format!("{}/v1/tracks/abc/stream?app_name={}", node.uri(), APP)
    );
}

#[tokio::test]
async fn test_zero_retries_still_tries_once() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc/stream"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&node)
        .await;
    let registry = registry_with(&[node.uri().as_str()]).await;
    let client = client_for(&registry, &[]).await;

    let url = client.resolver().resolve_stream_url("abc", 0).await;
    assert!(url.starts_with(&node.uri()));
    assert!(url.ends_with("/v1/tracks/abc/stream?app_name=test-app"));
}
