//! Integration tests for the archiver
//!
//! These tests use wiremock to serve a small forum and run the full
//! listing → thread → resolve → download → ledger cycle end-to-end.

use forum_archiver::config::{ClientConfig, Config, CrawlerConfig, ForumConfig, OutputConfig};
use forum_archiver::crawler::{build_http_client, parse_forum, AttachmentResolver, PageFetcher};
use forum_archiver::storage::{open_ledger, resume_target, NewLedgerEntry};
use forum_archiver::{ArchiverError, Ledger};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration archiving into `save_root`
fn create_test_config(save_root: &Path) -> Config {
    Config {
        client: ClientConfig {
            timeout_secs: 5,
            ..ClientConfig::default()
        },
        crawler: CrawlerConfig::default(),
        output: OutputConfig {
            save_root: save_root.to_path_buf(),
            ledger_file: PathBuf::from("ledger.db"),
        },
        forum: ForumConfig::default(),
    }
}

fn listing_html(thread_hrefs: &[&str], next: Option<&str>) -> String {
    let mut html = String::from(r#"<html><body><div class="structItemContainer">"#);
    for href in thread_hrefs {
        html.push_str(&format!(
            r#"<div class="structItem-title"><a href="{}">thread</a> <a href="/other">x</a></div>"#,
            href
        ));
    }
    html.push_str("</div>");
    if let Some(next) = next {
        html.push_str(&format!(
            r#"<nav class="pageNav"><a class="pageNav-jump pageNav-jump--next" href="{}">Next</a></nav>"#,
            next
        ));
    }
    html.push_str("</body></html>");
    html
}

fn thread_html(title: &str, attachments: &[(&str, &str)], primary: Option<&str>) -> String {
    let mut html = format!(
        r#"<html><body>
        <div class="p-title"><h1 class="p-title-value">{}</h1>"#,
        title
    );
    if let Some(href) = primary {
        html.push_str(&format!(
            r#"<div class="p-title-pageAction"><a class="button--cta button" href="{}">Download</a></div>"#,
            href
        ));
    }
    html.push_str(
        r#"</div>
        <div class="block-body js-replyNewMessageContainer">
          <article class="message">
            <a class="username" href="/members/1/">ivan</a>
            <div class="bbWrapper">Stock file attached.</div>
          </article>
        </div>
        <ul class="attachmentList">"#,
    );
    for (name, href) in attachments {
        html.push_str(&format!(
            r#"<li><a href="{}" title="{}">{}</a></li>"#,
            href, name, name
        ));
    }
    html.push_str("</ul></body></html>");
    html
}

fn interstitial_html(rows: &[(&str, &str)]) -> String {
    let mut html = String::from(r#"<html><body><div class="block-body">"#);
    for (name, href) in rows {
        html.push_str(&format!(
            r#"<div class="block-row">
                 <div class="contentRow-title">{}</div>
                 <div class="contentRow-extra"><a href="{}">Download</a></div>
               </div>"#,
            name, href
        ));
    }
    html.push_str("</div></body></html>");
    html
}

fn html_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

fn file_response(content: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(content.to_vec(), "application/octet-stream")
}

async fn mount_html(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html_response(body))
        .mount(server)
        .await;
}

fn start_url(server: &MockServer, listing_path: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), listing_path)).unwrap()
}

async fn crawl(
    server: &MockServer,
    listing_path: &str,
    save_root: &Path,
) -> Result<forum_archiver::CrawlSummary, ArchiverError> {
    let config = create_test_config(save_root);
    let client = build_http_client(&config.client).unwrap();
    parse_forum(
        client,
        &start_url(server, listing_path),
        save_root,
        &config,
        CancellationToken::new(),
    )
    .await
}

/// Relative paths and contents of every archived file, ledger files excluded
fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else if !path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("ledger.db")
            {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                out.push((relative, std::fs::read(&path).unwrap()));
            }
        }
    }

    let mut files = Vec::new();
    walk(root, root, &mut files);
    files.sort();
    files
}

#[tokio::test]
async fn test_pagination_visits_every_page_in_order() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(
            &["/threads/a.1/unread", "/threads/b.2/"],
            Some("/forums/ecu.2/page-2"),
        ),
    )
    .await;
    mount_html(
        &server,
        "/forums/ecu.2/page-2",
        listing_html(
            &["/threads/c.3/", "/threads/d.4/"],
            Some("/forums/ecu.2/page-3"),
        ),
    )
    .await;
    mount_html(
        &server,
        "/forums/ecu.2/page-3",
        listing_html(&["/threads/e.5/"], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/threads/"))
        .respond_with(html_response(thread_html("Thread", &[], None)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();

    assert_eq!(summary.pages_traversed, 3);
    let paths: Vec<String> = summary
        .threads
        .iter()
        .map(|t| Url::parse(&t.url).unwrap().path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/threads/a.1",
            "/threads/b.2/",
            "/threads/c.3/",
            "/threads/d.4/",
            "/threads/e.5/"
        ]
    );
    assert_eq!(summary.thread_failures, 0);
}

#[tokio::test]
async fn test_full_pipeline_is_idempotent() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/edc17.1/"], None),
    )
    .await;
    mount_html(
        &server,
        "/threads/edc17.1/",
        thread_html(
            "EDC17 C46: stock",
            &[("stock.bin", "/attachments/stock-bin.10/")],
            Some("/resources/77/download"),
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/attachments/stock-bin.10/"))
        .respond_with(file_response(b"stock flash"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/resources/77/download"))
        .respond_with(html_response(interstitial_html(&[(
            "firmware.bin",
            "/files/firmware.bin",
        )])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/firmware.bin"))
        .respond_with(file_response(b"firmware image"))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();

    let first = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();
    assert_eq!(first.attachments_saved, 2);
    let tree_after_first = snapshot(dir.path());
    let entries_after_first = open_ledger(&dir.path().join("ledger.db"))
        .unwrap()
        .entries()
        .unwrap();

    let second = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();
    assert_eq!(second.attachments_saved, 0);
    assert_eq!(second.duplicates_skipped, 2);

    assert_eq!(snapshot(dir.path()), tree_after_first);
    let entries_after_second = open_ledger(&dir.path().join("ledger.db"))
        .unwrap()
        .entries()
        .unwrap();
    assert_eq!(entries_after_second, entries_after_first);

    let sequences: Vec<u64> = entries_after_second.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);

    let thread_dir = dir.path().join("EDC17_C46__stock");
    assert_eq!(
        std::fs::read(thread_dir.join("stock.bin")).unwrap(),
        b"stock flash"
    );
    assert_eq!(
        std::fs::read(thread_dir.join("firmware.bin")).unwrap(),
        b"firmware image"
    );

    let description =
        std::fs::read_to_string(thread_dir.join("EDC17_C46__stock.txt")).unwrap();
    assert_eq!(description.matches("Author: ivan").count(), 1);
    assert!(description.contains("Description:\nStock file attached.\n"));
}

#[tokio::test]
async fn test_same_file_name_gets_collision_suffix() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/reports.3/"], None),
    )
    .await;
    mount_html(
        &server,
        "/threads/reports.3/",
        thread_html(
            "Reports",
            &[
                ("report.bin", "/attachments/report-bin.1/"),
                ("report.bin", "/attachments/report-bin.2/"),
            ],
            None,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/attachments/report-bin.1/"))
        .respond_with(file_response(b"one"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/attachments/report-bin.2/"))
        .respond_with(file_response(b"two"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();
    assert_eq!(summary.attachments_saved, 2);

    let thread_dir = dir.path().join("Reports");
    assert_eq!(std::fs::read(thread_dir.join("report.bin")).unwrap(), b"one");
    assert_eq!(
        std::fs::read(thread_dir.join("report - 1.bin")).unwrap(),
        b"two"
    );

    let entries = open_ledger(&dir.path().join("ledger.db"))
        .unwrap()
        .entries()
        .unwrap();
    assert_eq!(entries[1].attachment_name, "report - 1.bin");
}

#[tokio::test]
async fn test_reply_sentinel_is_not_archived() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/question.4/"], None),
    )
    .await;
    mount_html(
        &server,
        "/threads/question.4/",
        thread_html("Question", &[("reply", "/posts/99/reply")], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/posts/99/reply"))
        .respond_with(file_response(b"not a file"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();

    assert_eq!(summary.sentinels_skipped, 1);
    assert_eq!(summary.attachments_saved, 0);

    let files: Vec<PathBuf> = snapshot(dir.path()).into_iter().map(|(p, _)| p).collect();
    assert_eq!(files, vec![PathBuf::from("Question").join("Question.txt")]);

    let ledger = open_ledger(&dir.path().join("ledger.db")).unwrap();
    assert_eq!(ledger.count_entries().unwrap(), 0);
}

#[tokio::test]
async fn test_interstitial_resolves_to_real_file() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/me7.5/"], None),
    )
    .await;
    mount_html(
        &server,
        "/threads/me7.5/",
        thread_html("ME7", &[], Some("/resources/5/download")),
    )
    .await;
    mount_html(
        &server,
        "/resources/5/download",
        interstitial_html(&[("firmware.bin", "/files/5/firmware")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/5/firmware"))
        .respond_with(file_response(b"ME7 image"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();
    assert_eq!(summary.attachments_saved, 1);

    assert_eq!(
        std::fs::read(dir.path().join("ME7").join("firmware.bin")).unwrap(),
        b"ME7 image"
    );

    let entries = open_ledger(&dir.path().join("ledger.db"))
        .unwrap()
        .entries()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attachment_name, "firmware.bin");
    assert_eq!(
        entries[0].attachment_url,
        format!("{}/files/5/firmware", server.uri())
    );
    assert_eq!(entries[0].thread_title, "ME7");
}

#[tokio::test]
async fn test_interstitial_chain_past_limit_fails() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/resources/loop/",
        interstitial_html(&[("again", "/resources/loop/")]),
    )
    .await;

    let resolver = AttachmentResolver::new(PageFetcher::new(reqwest::Client::new()), 3);
    let resolved = resolver
        .resolve("", start_url(&server, "/resources/loop/"), &|_: &Url| false)
        .await;
    assert_eq!(resolved.len(), 1);
    assert!(matches!(
        resolved[0],
        Err(ArchiverError::RecursionLimitExceeded { depth: 3, .. })
    ));

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/loop.6/"], None),
    )
    .await;
    mount_html(
        &server,
        "/threads/loop.6/",
        thread_html("Loop", &[], Some("/resources/loop/")),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();

    assert_eq!(summary.attachment_failures, 1);
    assert_eq!(summary.threads.len(), 1);
    let ledger = open_ledger(&dir.path().join("ledger.db")).unwrap();
    assert_eq!(ledger.count_entries().unwrap(), 0);
}

#[tokio::test]
async fn test_looping_interstitial_row_keeps_good_rows() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/mixed.7/"], None),
    )
    .await;
    mount_html(
        &server,
        "/threads/mixed.7/",
        thread_html("Mixed", &[], Some("/resources/7/download")),
    )
    .await;
    mount_html(
        &server,
        "/resources/7/download",
        interstitial_html(&[
            ("good.bin", "/files/7/good"),
            ("mirror", "/resources/loop/"),
        ]),
    )
    .await;
    mount_html(
        &server,
        "/resources/loop/",
        interstitial_html(&[("again", "/resources/loop/")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/7/good"))
        .respond_with(file_response(b"good image"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();

    assert_eq!(summary.attachments_saved, 1);
    assert_eq!(summary.attachment_failures, 1);
    assert_eq!(
        std::fs::read(dir.path().join("Mixed").join("good.bin")).unwrap(),
        b"good image"
    );

    let entries = open_ledger(&dir.path().join("ledger.db"))
        .unwrap()
        .entries()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attachment_name, "good.bin");
}

#[tokio::test]
async fn test_known_attachment_is_never_requested() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/known.7/"], None),
    )
    .await;
    mount_html(
        &server,
        "/threads/known.7/",
        thread_html("Known", &[("known.bin", "/attachments/known.70/")], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/attachments/known.70/"))
        .respond_with(file_response(b"unused"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    {
        let mut ledger = open_ledger(&dir.path().join("ledger.db")).unwrap();
        ledger
            .append_and_persist(NewLedgerEntry {
                thread_title: "Known".to_string(),
                thread_url: format!("{}/threads/known.7/", server.uri()),
                attachment_url: format!("{}/attachments/known.70/", server.uri()),
                attachment_name: "known.bin".to_string(),
            })
            .unwrap();
    }

    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();

    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(summary.attachments_saved, 0);
    assert!(!dir.path().join("Known").join("known.bin").exists());
}

#[tokio::test]
async fn test_base_url_keeps_first_listing() {
    let server = MockServer::start().await;

    mount_html(&server, "/forums/first.1/", listing_html(&[], None)).await;
    mount_html(&server, "/forums/second.2/", listing_html(&[], None)).await;

    let dir = TempDir::new().unwrap();
    crawl(&server, "/forums/first.1/", dir.path()).await.unwrap();
    crawl(&server, "/forums/second.2/", dir.path()).await.unwrap();

    let ledger_path = dir.path().join("ledger.db");
    let ledger = open_ledger(&ledger_path).unwrap();
    let first = format!("{}/forums/first.1/", server.uri());
    assert_eq!(ledger.base_url().unwrap(), Some(first.clone()));

    let (url, directory) = resume_target(&ledger_path).unwrap().unwrap();
    assert_eq!(url, first);
    assert_eq!(directory, dir.path());
}

#[tokio::test]
async fn test_first_listing_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forums/down.1/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let result = crawl(&server, "/forums/down.1/", dir.path()).await;

    assert!(matches!(
        result,
        Err(ArchiverError::Fetch {
            status: Some(500),
            ..
        })
    ));

    let ledger = open_ledger(&dir.path().join("ledger.db")).unwrap();
    assert_eq!(ledger.base_url().unwrap(), None);
}

#[tokio::test]
async fn test_failing_thread_does_not_stop_crawl() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/forums/ecu.2/",
        listing_html(&["/threads/broken.8/", "/threads/fine.9/"], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/threads/broken.8/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_html(&server, "/threads/fine.9/", thread_html("Fine", &[], None)).await;

    let dir = TempDir::new().unwrap();
    let summary = crawl(&server, "/forums/ecu.2/", dir.path()).await.unwrap();

    assert_eq!(summary.thread_failures, 1);
    assert_eq!(summary.threads.len(), 1);
    assert_eq!(summary.threads[0].title, "Fine");
    assert!(dir.path().join("Fine").join("Fine.txt").exists());
}
