use super::support::{article, listing, pagination, serve, serve_ok};
use crate::config::SelectorConfig;
use crate::drivers::{Driver, StaticPageDriver};
use crate::error::CheckError;
use crate::filter::LinkFilter;
use crate::inspector::MISSING_HREF;
use crate::probe::{CachingProbe, HttpProbe};
use crate::results::{LinkError, RecordBatch, WalkStats};
use crate::walker::ListingWalker;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

const TIMEOUT: Duration = Duration::from_millis(300);

struct Fixture {
    server: MockServer,
    driver: StaticPageDriver,
    probe: HttpProbe,
    filter: LinkFilter,
    selectors: SelectorConfig,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        serve_ok(&server, "/ok").await;
        Self {
            server,
            driver: StaticPageDriver::new(Client::new()),
            probe: HttpProbe::with_client(Client::new()),
            filter: LinkFilter::default(),
            selectors: SelectorConfig::default(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    async fn walk_from(
        &self,
        seed: &str,
        max_pages: usize,
        cancel: CancellationToken,
    ) -> (Result<WalkStats, CheckError>, RecordBatch) {
        self.driver.navigate(&self.url(seed)).await.unwrap();
        let walker = ListingWalker::new(
            &self.driver,
            &self.probe,
            &self.filter,
            &self.selectors,
            TIMEOUT,
            max_pages,
            cancel,
        );
        let mut batch = RecordBatch::new();
        let result = walker.walk(&mut batch).await;
        (result, batch)
    }

    async fn walk(&self, seed: &str) -> (WalkStats, RecordBatch) {
        let (result, batch) = self.walk_from(seed, 1000, CancellationToken::new()).await;
        (result.unwrap(), batch)
    }
}

#[tokio::test]
async fn test_single_page_records_only_broken_links() {
    let fx = Fixture::new().await;
    serve(&fx.server, "/news/", listing(&["/news/a/", "/news/b/"], "")).await;
    serve(
        &fx.server,
        "/news/a/",
        article("Article A", &[("gone", "/missing"), ("fine", "/ok")]),
    )
    .await;
    serve(&fx.server, "/news/b/", article("Article B", &[("fine", "/ok")])).await;

    let (stats, batch) = fx.walk("/news/").await;

    assert_eq!(
        stats,
        WalkStats {
            pages: 1,
            articles: 2,
            failed_articles: 0,
        }
    );
    assert_eq!(batch.len(), 1);
    let record = &batch.records()[0];
    assert_eq!(record.article_title, "Article A");
    assert_eq!(record.article_url, fx.url("/news/a/"));
    assert_eq!(record.error, LinkError::Status(404));
    assert_eq!(record.anchor_text, "gone");
    assert_eq!(record.target_url, fx.url("/missing"));
}

#[tokio::test]
async fn test_article_windows_are_always_closed() {
    let fx = Fixture::new().await;
    serve(
        &fx.server,
        "/news/",
        listing(&["/news/a/", "/news/no-heading/", "/news/b/"], ""),
    )
    .await;
    serve(&fx.server, "/news/a/", article("Article A", &[("fine", "/ok")])).await;
    serve(
        &fx.server,
        "/news/no-heading/",
        "<html><body><div id=\"content\"><a href=\"/missing\">x</a></div></body></html>".to_string(),
    )
    .await;
    serve(&fx.server, "/news/b/", article("Article B", &[("gone", "/missing")])).await;

    let (stats, batch) = fx.walk("/news/").await;

    assert_eq!(stats.articles, 2);
    assert_eq!(stats.failed_articles, 1);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.records()[0].article_title, "Article B");

    let windows = fx.driver.window_stats();
    assert_eq!(windows.opened, 3);
    assert_eq!(windows.closed, 3);
    assert_eq!(windows.open_now, 1);
    assert_eq!(fx.driver.current_url(), Some(fx.url("/news/")));
}

#[tokio::test]
async fn test_article_without_content_block_yields_nothing() {
    let fx = Fixture::new().await;
    serve(&fx.server, "/news/", listing(&["/news/bare/"], "")).await;
    serve(
        &fx.server,
        "/news/bare/",
        "<html><body><h1>Bare</h1><a href=\"/missing\">outside</a></body></html>".to_string(),
    )
    .await;

    let (stats, batch) = fx.walk("/news/").await;

    assert_eq!(stats.articles, 1);
    assert_eq!(stats.failed_articles, 0);
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_links_outside_content_are_ignored() {
    let fx = Fixture::new().await;
    serve(&fx.server, "/news/", listing(&["/news/a/"], "")).await;
    // The page menu links to a path that is never served
    serve(&fx.server, "/news/a/", article("Only menu is broken", &[("fine", "/ok")])).await;

    let (_, batch) = fx.walk("/news/").await;
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_follows_pagination_until_last_page() {
    let fx = Fixture::new().await;
    serve(
        &fx.server,
        "/news/",
        listing(
            &["/news/p1/"],
            &pagination(&[
                ("1", Some("/news/")),
                ("2", Some("/news/page-2/")),
                ("›", Some("/news/page-2/")),
                ("»", Some("/news/page-3/")),
            ]),
        ),
    )
    .await;
    serve(
        &fx.server,
        "/news/page-2/",
        listing(
            &["/news/p2/"],
            &pagination(&[
                ("‹", Some("/news/")),
                ("1", Some("/news/")),
                ("3", Some("/news/page-3/")),
                ("›", Some("/news/page-3/")),
                ("»", Some("/news/page-3/")),
            ]),
        ),
    )
    .await;
    serve(
        &fx.server,
        "/news/page-3/",
        listing(
            &["/news/p3/"],
            &pagination(&[
                ("‹", Some("/news/page-2/")),
                ("1", Some("/news/")),
                ("2", Some("/news/page-2/")),
                ("3", Some("/news/page-3/")),
            ]),
        ),
    )
    .await;
    serve(&fx.server, "/news/p1/", article("Page one", &[("gone", "/missing-1")])).await;
    serve(&fx.server, "/news/p2/", article("Page two", &[("fine", "/ok")])).await;
    serve(&fx.server, "/news/p3/", article("Page three", &[("gone", "/missing-3")])).await;

    let (stats, batch) = fx.walk("/news/").await;

    assert_eq!(stats.pages, 3);
    assert_eq!(stats.articles, 3);
    let titles: Vec<&str> = batch
        .records()
        .iter()
        .map(|r| r.article_title.as_str())
        .collect();
    assert_eq!(titles, vec!["Page one", "Page three"]);
    assert_eq!(fx.driver.current_url(), Some(fx.url("/news/page-3/")));
}

#[tokio::test]
async fn test_self_linking_next_stops_at_page_cap() {
    let fx = Fixture::new().await;
    serve(
        &fx.server,
        "/news/",
        listing(
            &["/news/a/"],
            &pagination(&[
                ("1", Some("/news/")),
                ("›", Some("/news/")),
                ("»", Some("/news/")),
            ]),
        ),
    )
    .await;
    serve(&fx.server, "/news/a/", article("Looping", &[("gone", "/missing")])).await;

    let (result, batch) = fx.walk_from("/news/", 4, CancellationToken::new()).await;
    let stats = result.unwrap();

    assert_eq!(stats.pages, 4);
    assert_eq!(stats.articles, 4);
    assert_eq!(batch.len(), 4);
}

#[tokio::test]
async fn test_next_link_that_does_not_navigate_ends_listing() {
    let fx = Fixture::new().await;
    serve(
        &fx.server,
        "/news/",
        listing(
            &["/news/a/"],
            &pagination(&[
                ("1", Some("/news/")),
                ("›", None),
                ("»", None),
            ]),
        ),
    )
    .await;
    serve(&fx.server, "/news/a/", article("Stuck", &[("fine", "/ok")])).await;

    let (stats, _) = fx.walk("/news/").await;
    assert_eq!(stats.pages, 1);
    assert_eq!(stats.articles, 1);
}

#[tokio::test]
async fn test_empty_listing_ends_immediately() {
    let fx = Fixture::new().await;
    serve(&fx.server, "/news/", listing(&[], "")).await;

    let (stats, batch) = fx.walk("/news/").await;
    assert_eq!(stats, WalkStats::default());
    assert!(batch.is_empty());
    assert_eq!(fx.driver.window_stats().opened, 0);
}

#[tokio::test]
async fn test_cancelled_walk_stops_before_work() {
    let fx = Fixture::new().await;
    serve(&fx.server, "/news/", listing(&["/news/a/"], "")).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (result, batch) = fx.walk_from("/news/", 10, cancel).await;

    assert!(matches!(result, Err(CheckError::Cancelled)));
    assert!(batch.is_empty());
    assert_eq!(fx.driver.window_stats().opened, 0);
}

#[tokio::test]
async fn test_repeated_targets_are_probed_once_with_cache() {
    let fx = Fixture::new().await;
    serve(&fx.server, "/news/", listing(&["/news/a/", "/news/b/"], "")).await;
    serve(&fx.server, "/news/a/", article("A", &[("gone", "/missing"), ("fine", "/ok")])).await;
    serve(&fx.server, "/news/b/", article("B", &[("gone again", "/missing")])).await;

    fx.driver.navigate(&fx.url("/news/")).await.unwrap();
    let cache = CachingProbe::new(&fx.probe);
    let walker = ListingWalker::new(
        &fx.driver,
        &cache,
        &fx.filter,
        &fx.selectors,
        TIMEOUT,
        10,
        CancellationToken::new(),
    );
    let mut batch = RecordBatch::new();
    walker.walk(&mut batch).await.unwrap();

    // Each article still reports its own occurrence
    assert_eq!(batch.len(), 2);
    assert_eq!(cache.distinct(), 2);
}

#[tokio::test]
async fn test_exclude_pattern_skips_matching_targets() {
    let mut fx = Fixture::new().await;
    fx.filter = LinkFilter::new(&[], &["/missing".to_string()]).unwrap();
    serve(&fx.server, "/news/", listing(&["/news/a/"], "")).await;
    serve(&fx.server, "/news/a/", article("A", &[("gone", "/missing")])).await;

    let (_, batch) = fx.walk("/news/").await;
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_in_page_next_link_is_not_a_new_page() {
    let fx = Fixture::new().await;
    serve(
        &fx.server,
        "/news/",
        listing(
            &["/news/a/"],
            &pagination(&[
                ("1", Some("/news/")),
                ("›", Some("#")),
                ("»", Some("#")),
            ]),
        ),
    )
    .await;
    serve(&fx.server, "/news/a/", article("Hash pager", &[("gone", "/missing")])).await;

    let (result, batch) = fx.walk_from("/news/", 5, CancellationToken::new()).await;
    let stats = result.unwrap();

    assert_eq!(stats.pages, 1);
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn test_anchors_without_target_are_recorded() {
    let fx = Fixture::new().await;
    serve(&fx.server, "/news/", listing(&["/news/a/"], "")).await;
    serve(
        &fx.server,
        "/news/a/",
        "<html><body><h1>Loose anchors</h1><div id=\"content\">\
         <a>bad</a><a href=\"\">empty</a><a href=\"/ok\">fine</a></div></body></html>"
            .to_string(),
    )
    .await;

    let (stats, batch) = fx.walk("/news/").await;

    assert_eq!(stats.articles, 1);
    let rows: Vec<(&str, &str)> = batch
        .records()
        .iter()
        .map(|r| (r.anchor_text.as_str(), r.target_url.as_str()))
        .collect();
    assert_eq!(rows, vec![("bad", ""), ("empty", "")]);
    for record in batch.records() {
        assert_eq!(record.error, LinkError::Transport(MISSING_HREF.to_string()));
        assert_eq!(record.article_title, "Loose anchors");
    }
}
