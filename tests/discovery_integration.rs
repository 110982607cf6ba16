//! Integration tests for discovery.
//!
//! These tests crawl a wiremock site and check which images are reported
//! and which pages are fetched.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use harvester_core::discovery::{CrawlConfig, DiscoveryEngine, DiscoveryError};
use harvester_core::download::HttpClient;
use harvester_core::policy::PolicyFetcher;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::{html_response, mount_page};

fn engine(config: CrawlConfig) -> DiscoveryEngine {
    DiscoveryEngine::new(HttpClient::new(), config)
}

fn seed(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

fn image_urls(report: &harvester_core::DiscoveryReport) -> Vec<String> {
    report.resources.iter().map(|r| r.url().to_string()).collect()
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/plain"))
        .mount(server)
        .await;
}

async fn mount_unreachable(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_response("<html></html>"))
        .expect(0)
        .mount(server)
        .await;
}

// ==================== Crawl Shape ====================

#[tokio::test]
async fn test_collects_images_from_seed_and_linked_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
            <img src="/img/hero.jpg" alt="Hero">
            <a href="/gallery">Gallery</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/gallery",
        r#"<html><body><img src="photos/one.png"><img src="/img/hero.jpg"></body></html>"#,
    )
    .await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    assert!(report.is_ok(), "unexpected error: {:?}", report.error);
    assert_eq!(report.pages_fetched, 2);
    assert!(!report.budget_exhausted);
    assert_eq!(
        image_urls(&report),
        vec![
            format!("{}/img/hero.jpg", server.uri()),
            format!("{}/photos/one.png", server.uri()),
        ]
    );
    assert_eq!(report.resources[0].alt_text(), Some("Hero"));
    assert_eq!(report.resources[0].source_url(), seed(&server));
    assert_eq!(
        report.resources[1].source_url(),
        format!("{}/gallery", server.uri())
    );
}

#[tokio::test]
async fn test_linked_pages_are_not_expanded_further() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/level1">next</a>"#).await;
    mount_page(
        &server,
        "/level1",
        r#"<img src="/img/l1.png"><a href="/level2">deeper</a>"#,
    )
    .await;
    mount_unreachable(&server, "/level2").await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(image_urls(&report), vec![format!("{}/img/l1.png", server.uri())]);
}

#[tokio::test]
async fn test_nofollow_and_offsite_links_are_ignored() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/hidden" rel="nofollow">hidden</a>
           <a href="https://elsewhere.example/page">elsewhere</a>
           <a href="mailto:someone@example.com">mail</a>
           <a href="/shown#section">shown</a>"#,
    )
    .await;
    mount_unreachable(&server, "/hidden").await;
    mount_page(&server, "/shown", r#"<img src="/img/shown.png">"#).await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    assert!(report.is_ok());
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(image_urls(&report), vec![format!("{}/img/shown.png", server.uri())]);
}

#[tokio::test]
async fn test_follows_at_most_ten_links() {
    let server = MockServer::start().await;
    let anchors: String = (0..12).map(|i| format!(r#"<a href="/p{i}">{i}</a>"#)).collect();
    mount_page(&server, "/", &anchors).await;
    for i in 0..10 {
        mount_page(&server, &format!("/p{i}"), &format!(r#"<img src="/img/{i}.png">"#)).await;
    }
    mount_unreachable(&server, "/p10").await;
    mount_unreachable(&server, "/p11").await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    assert_eq!(report.pages_fetched, 11);
    assert_eq!(report.resources.len(), 10);
}

#[tokio::test]
async fn test_filters_tracking_and_small_images() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<img src="/img/keep.jpg" width="640" height="480">
           <img src="/img/tiny.gif" width="1" height="1">
           <img src="/analytics/collect.gif">
           <img src="/img/spacer.gif" alt="tracking pixel">
           <img src="data:image/png;base64,AAAA">
           <img src="/img/wide.png" width="10">"#,
    )
    .await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    assert_eq!(
        image_urls(&report),
        vec![
            format!("{}/img/keep.jpg", server.uri()),
            format!("{}/img/wide.png", server.uri()),
        ]
    );
}

#[tokio::test]
async fn test_repeated_crawls_are_identical() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<img src="/a.png"><a href="/one">1</a><a href="/two">2</a>"#,
    )
    .await;
    mount_page(&server, "/one", r#"<img src="/b.png"><img src="/c.png">"#).await;
    mount_page(&server, "/two", r#"<img src="/c.png"><img src="/d.png">"#).await;

    let engine = engine(CrawlConfig::default());
    let first = engine.discover(&seed(&server), "first").await;
    let second = engine.discover(&seed(&server), "second").await;

    assert_eq!(first.resources, second.resources);
    assert_eq!(first.resources.len(), 4);
}

// ==================== Budget ====================

#[tokio::test]
async fn test_resource_cap_stops_crawl() {
    let server = MockServer::start().await;
    let images: String = (0..5).map(|i| format!(r#"<img src="/img/{i}.png">"#)).collect();
    mount_page(&server, "/", &format!(r#"{images}<a href="/more">more</a>"#)).await;
    mount_unreachable(&server, "/more").await;

    let config = CrawlConfig {
        max_resources: 3,
        ..CrawlConfig::default()
    };
    let report = engine(config).discover(&seed(&server), "test").await;

    assert!(report.is_ok());
    assert!(report.budget_exhausted);
    assert_eq!(report.resources.len(), 3);
    assert_eq!(report.pages_fetched, 1);
}

#[tokio::test]
async fn test_elapsed_budget_stops_expansion() {
    let server = MockServer::start().await;
    let anchors: String = (0..4).map(|i| format!(r#"<a href="/p{i}">{i}</a>"#)).collect();
    mount_page(&server, "/", &anchors).await;
    Mock::given(method("GET"))
        .and(path("/p0"))
        .respond_with(html_response(r#"<img src="/img/p0.png">"#).set_delay(Duration::from_millis(1500)))
        .expect(1)
        .mount(&server)
        .await;
    for i in 1..4 {
        mount_unreachable(&server, &format!("/p{i}")).await;
    }

    let config = CrawlConfig {
        max_elapsed: Duration::from_secs(1),
        ..CrawlConfig::default()
    };
    let report = engine(config).discover(&seed(&server), "test").await;

    assert!(report.is_ok());
    assert!(report.budget_exhausted);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(image_urls(&report), vec![format!("{}/img/p0.png", server.uri())]);
}

// ==================== Redirects ====================

#[tokio::test]
async fn test_relative_references_resolve_against_redirect_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/gallery/index.html"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/gallery/index.html",
        r#"<img src="pic.png"><a href="next.html">next</a>"#,
    )
    .await;
    mount_page(&server, "/gallery/next.html", r#"<img src="more.png">"#).await;

    let report = engine(CrawlConfig::default())
        .discover(&format!("{}/start", server.uri()), "test")
        .await;

    assert!(report.is_ok(), "unexpected error: {:?}", report.error);
    assert_eq!(
        image_urls(&report),
        vec![
            format!("{}/gallery/pic.png", server.uri()),
            format!("{}/gallery/more.png", server.uri()),
        ]
    );
    assert_eq!(
        report.resources[0].source_url(),
        format!("{}/gallery/index.html", server.uri())
    );
}

#[tokio::test]
async fn test_same_host_links_follow_the_redirected_host() {
    let server = MockServer::start().await;
    let port = server.address().port();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("http://127.0.0.1:{port}/home").as_str()),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/home",
        &format!(r#"<a href="http://127.0.0.1:{port}/other">other</a>"#),
    )
    .await;
    mount_page(&server, "/other", r#"<img src="/img/other.png">"#).await;

    let report = engine(CrawlConfig::default())
        .discover(&format!("http://localhost:{port}/"), "test")
        .await;

    assert!(report.is_ok(), "unexpected error: {:?}", report.error);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(
        image_urls(&report),
        vec![format!("http://127.0.0.1:{port}/img/other.png")]
    );
}

// ==================== Robots ====================

#[tokio::test]
async fn test_disallowed_seed_is_blocked_without_fetching() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /\n").await;
    mount_unreachable(&server, "/").await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    assert!(matches!(report.error, Some(DiscoveryError::PolicyBlocked { .. })));
    assert!(report.resources.is_empty());
    assert_eq!(report.pages_fetched, 0);
}

#[tokio::test]
async fn test_disallowed_links_are_skipped() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private\n").await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/a">a</a><a href="/public/b">b</a>"#,
    )
    .await;
    mount_unreachable(&server, "/private/a").await;
    mount_page(&server, "/public/b", r#"<img src="/img/b.png">"#).await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    assert!(report.is_ok());
    assert_eq!(image_urls(&report), vec![format!("{}/img/b.png", server.uri())]);
}

#[tokio::test]
async fn test_robots_checks_can_be_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /\n", "text/plain"))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/", r#"<img src="/img/a.png">"#).await;

    let config = CrawlConfig {
        check_robots: false,
        ..CrawlConfig::default()
    };
    let report = engine(config).discover(&seed(&server), "test").await;

    assert!(report.is_ok());
    assert_eq!(report.resources.len(), 1);
}

#[tokio::test]
async fn test_custom_policy_is_consulted_for_every_page() {
    struct DenyPath {
        denied: &'static str,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PolicyFetcher for DenyPath {
        async fn is_allowed(&self, url: &Url) -> bool {
            self.asked.lock().unwrap().push(url.path().to_string());
            url.path() != self.denied
        }
    }

    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
    mount_page(&server, "/a", r#"<img src="/img/a.png">"#).await;
    mount_unreachable(&server, "/b").await;

    let policy = DenyPath {
        denied: "/b",
        asked: Mutex::new(Vec::new()),
    };
    let report = engine(CrawlConfig::default())
        .discover_with_policy(&seed(&server), "test", &policy)
        .await;

    assert_eq!(report.resources.len(), 1);
    assert_eq!(*policy.asked.lock().unwrap(), vec!["/", "/a", "/b"]);
}

// ==================== Failures ====================

#[tokio::test]
async fn test_unreachable_seed_reports_error() {
    let server = MockServer::start().await;

    let report = engine(CrawlConfig::default()).discover(&seed(&server), "test").await;

    match report.error {
        Some(DiscoveryError::SeedUnreachable { url, .. }) => assert_eq!(url, seed(&server)),
        other => panic!("expected unreachable seed, got {other:?}"),
    }
    assert!(report.resources.is_empty());
}

#[tokio::test]
async fn test_failed_linked_page_is_skipped() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<img src="/img/seed.png"><a href="/missing">x</a><a href="/slow">y</a><a href="/ok">z</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_response(r#"<img src="/img/slow.png">"#).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    mount_page(&server, "/ok", r#"<img src="/img/ok.png">"#).await;

    let config = CrawlConfig {
        page_timeout: Duration::from_millis(300),
        ..CrawlConfig::default()
    };
    let report = engine(config).discover(&seed(&server), "test").await;

    assert!(report.is_ok());
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(
        image_urls(&report),
        vec![
            format!("{}/img/seed.png", server.uri()),
            format!("{}/img/ok.png", server.uri()),
        ]
    );
}

#[tokio::test]
async fn test_invalid_seed_is_rejected() {
    let report = engine(CrawlConfig::default()).discover("ftp://example.com/", "test").await;
    assert!(matches!(report.error, Some(DiscoveryError::InvalidSeed { .. })));
}
