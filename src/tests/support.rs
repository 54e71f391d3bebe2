//! Fixture site served by wiremock, shaped like a real news listing

use crate::config::CheckerConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

/// Always answers 200, used as a live link target
pub async fn serve_ok(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Listing page with one entry per article path and optional pagination markup
pub fn listing(articles: &[&str], pagination: &str) -> String {
    let entries: String = articles
        .iter()
        .map(|href| format!(r#"<div class="image"><a href="{}"><img src="/i.png"></a></div>"#, href))
        .collect();
    format!(
        "<html><body><div class=\"list\">{}</div>{}</body></html>",
        entries, pagination
    )
}

/// Pagination block from `(label, href)` pairs; `None` renders a link without target
pub fn pagination(links: &[(&str, Option<&str>)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(label, href)| match href {
            Some(href) => format!(r#"<a href="{}">{}</a>"#, href, label),
            None => format!("<a>{}</a>", label),
        })
        .collect();
    format!(r#"<div class="pagination">{}</div>"#, anchors)
}

/// Article page with a heading and `(text, href)` links inside the content block
pub fn article(title: &str, links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(text, href)| format!(r#"<p><a href="{}">{}</a></p>"#, href, text))
        .collect();
    format!(
        "<html><body><h1>{}</h1><div id=\"content\">{}</div><a href=\"/nav-link-never-checked\">menu</a></body></html>",
        title, anchors
    )
}

pub fn test_config(output_dir: &std::path::Path) -> CheckerConfig {
    CheckerConfig {
        ui_timeout_secs: 1,
        probe_timeout_secs: 5,
        output_dir: output_dir.to_path_buf(),
        ..CheckerConfig::default()
    }
}
