//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up a host and drive frontier entries
//! through the full fetch, process, persist cycle.

use exam_crawler::config::{parse_config, Config};
use exam_crawler::crawler::{Crawler, Outcome};
use exam_crawler::storage::{open_storage, FrontierEntry, Link, Storage};
use exam_crawler::CrawlError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration allowing only the loopback host
///
/// `extra` is appended as additional top-level tables.
fn create_test_config(blob_dir: &Path, extra: &str) -> Config {
    let content = format!(
        r#"
blacklist = ["/print/"]

[crawler]
workers = 1

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[storage]
database-path = "unused.db"

[filter]
capacity = 10000

[blob]
kind = "local"
directory = "{}"

[[host]]
name = "127.0.0.1"

{}
"#,
        blob_dir.display(),
        extra
    );
    parse_config(&content).expect("test config should parse")
}

struct Harness {
    _dir: TempDir,
    blob_dir: std::path::PathBuf,
    storage: Arc<dyn Storage>,
    crawler: Crawler,
}

fn harness() -> Harness {
    harness_with("")
}

fn harness_with(extra: &str) -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let blob_dir = dir.path().join("blobs");
    let storage: Arc<dyn Storage> =
        Arc::new(open_storage(&dir.path().join("crawl.db")).expect("Failed to open storage"));
    let crawler = Crawler::from_config(create_test_config(&blob_dir, extra), Arc::clone(&storage))
        .expect("Failed to build crawler");

    Harness {
        _dir: dir,
        blob_dir,
        storage,
        crawler,
    }
}

fn link(url: String) -> Link {
    Link {
        title: String::new(),
        url,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[tokio::test]
async fn test_pdf_with_session_query() {
    let server = MockServer::start().await;
    let body = b"%PDF-1.4 not a complete document".to_vec();

    Mock::given(method("GET"))
        .and(path("/~foo/exam.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(body.clone()),
        )
        .mount(&server)
        .await;

    let h = harness();
    let url = format!("{}/~foo/exam.pdf?session=abc", server.uri());

    let added = h
        .crawler
        .frontier()
        .add_and_expand(&[link(url.clone())], "", true)
        .await
        .unwrap();
    // The URL itself plus its query-stripped form, nothing further up
    assert_eq!(added, 2);

    let entry = h.storage.get_frontier(&url).unwrap().expect("entry stored");
    let outcome = h.crawler.process_entry(0, &entry).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Stored {
            status: 200,
            links_added: 0
        }
    );

    let hash = sha256_hex(&body);
    let document = h.storage.get_document(&hash).unwrap().expect("document saved");
    assert_eq!(document.source_url, url);
    assert_eq!(document.status_code, 200);
    assert_eq!(document.content_type, "application/pdf");
    assert!(document.text.is_empty());

    let storage_url = document.storage_url.expect("blob location recorded");
    assert!(storage_url.ends_with(&format!("{}-exam.pdf", hash)));
    assert!(h.blob_dir.join(format!("{}-exam.pdf", hash)).exists());

    assert!(!h.storage.is_live(&url).unwrap());
    assert!(h
        .storage
        .is_live(&format!("{}/~foo/exam.pdf", server.uri()))
        .unwrap());
    assert_eq!(h.storage.frontier_count().unwrap(), 2);
}

/// A one-page PDF with a title, an author, and one line of text
fn exam_pdf() -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 14.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("Midterm 2 Sample Questions")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content encodes"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("CPSC 213 Midterm 2"),
        "Author" => Object::string_literal("Course Staff"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf saves");
    bytes
}

#[tokio::test]
async fn test_pdf_text_and_metadata_are_stored() {
    let server = MockServer::start().await;
    let body = exam_pdf();

    Mock::given(method("GET"))
        .and(path("/~foo/cpsc213/mt2.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let h = harness();
    let url = format!("{}/~foo/cpsc213/mt2.pdf", server.uri());
    h.crawler
        .frontier()
        .add_urls(vec![FrontierEntry::new(url.as_str(), "Midterm 2", "")])
        .await
        .unwrap();

    let entry = h.storage.get_frontier(&url).unwrap().unwrap();
    let outcome = h.crawler.process_entry(0, &entry).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Stored {
            status: 200,
            links_added: 0
        }
    );

    let hash = sha256_hex(&body);
    let document = h.storage.get_document(&hash).unwrap().expect("document saved");
    assert_eq!(document.content_type, "application/pdf");
    assert_eq!(document.title, "CPSC 213 Midterm 2");
    assert_eq!(document.url_title, "Midterm 2");
    assert_eq!(document.text, "Midterm 2 Sample Questions");
    assert_eq!(
        document.metadata.get("author").map(String::as_str),
        Some("Course Staff")
    );
    assert_eq!(document.metadata.get("pages").map(String::as_str), Some("1"));
    assert!(h.blob_dir.join(format!("{}-mt2.pdf", hash)).exists());
}

#[tokio::test]
async fn test_html_page_enqueues_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    let html = format!(
        r##"<html><head><title>Past Exams</title></head><body>
            <h1>CPSC 221</h1>
            <a href="a.pdf">Final 2019</a>
            <a href="sub/page.html#frag">More</a>
            <a href="sub/page.html">More again</a>
            <a href="#top">Top</a>
            <a href="http://other.example.com/x">Elsewhere</a>
            <a href="{}/~foo/print/a.pdf">Printable</a>
            </body></html>"##,
        base
    );

    Mock::given(method("GET"))
        .and(path("/~foo/exams/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.clone()))
        .mount(&server)
        .await;

    let h = harness();
    let page = format!("{}/~foo/exams/index.html", base);
    let added = h
        .crawler
        .frontier()
        .add_urls(vec![FrontierEntry::new(page.as_str(), "Exams", "")])
        .await
        .unwrap();
    assert_eq!(added, 1);

    let entry = h.storage.get_frontier(&page).unwrap().unwrap();
    let outcome = h.crawler.process_entry(0, &entry).await.unwrap();

    // a.pdf, sub/page.html, and the directories /~foo/exams/sub/,
    // /~foo/exams/, and /~foo/; the host root is never queued
    assert_eq!(
        outcome,
        Outcome::Stored {
            status: 200,
            links_added: 5
        }
    );

    for expected in [
        "/~foo/exams/a.pdf",
        "/~foo/exams/sub/page.html",
        "/~foo/exams/sub/",
        "/~foo/exams/",
        "/~foo/",
    ] {
        let url = format!("{}{}", base, expected);
        assert!(h.storage.is_live(&url).unwrap(), "{} should be live", url);
    }
    assert!(h.storage.get_frontier(&format!("{}/", base)).unwrap().is_none());

    let document = h
        .storage
        .get_document(&sha256_hex(html.as_bytes()))
        .unwrap()
        .expect("page saved");
    assert_eq!(document.title, "Past Exams");
    assert_eq!(document.url_title, "Exams");
    assert!(document.text.contains("CPSC 221"));
    assert!(!document.text.contains("  "));
}

#[tokio::test]
async fn test_identical_content_is_stored_once() {
    let server = MockServer::start().await;
    let body = b"%PDF-1.4 shared bytes".to_vec();

    for p in ["/~foo/final.pdf", "/~bar/final-copy.pdf"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;
    }

    let h = harness();
    let first = format!("{}/~foo/final.pdf", server.uri());
    let second = format!("{}/~bar/final-copy.pdf", server.uri());
    h.crawler
        .frontier()
        .add_urls(vec![
            FrontierEntry::new(first.as_str(), "", ""),
            FrontierEntry::new(second.as_str(), "", ""),
        ])
        .await
        .unwrap();

    let entry = h.storage.get_frontier(&first).unwrap().unwrap();
    assert!(matches!(
        h.crawler.process_entry(0, &entry).await.unwrap(),
        Outcome::Stored { .. }
    ));

    let entry = h.storage.get_frontier(&second).unwrap().unwrap();
    assert_eq!(
        h.crawler.process_entry(0, &entry).await.unwrap(),
        Outcome::Duplicate
    );

    assert_eq!(h.storage.document_count().unwrap(), 1);
    let document = h.storage.get_document(&sha256_hex(&body)).unwrap().unwrap();
    assert_eq!(document.source_url, first);
    assert!(!h.storage.is_live(&first).unwrap());
    assert!(!h.storage.is_live(&second).unwrap());
}

#[tokio::test]
async fn test_robots_fetch_failure_permits_crawling() {
    for status in [404, 500] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let h = harness();
        let url = format!("{}/~foo/exams/", server.uri());
        assert!(h.crawler.frontier().validator().validate(&url).await.unwrap());
    }
}

#[tokio::test]
async fn test_robots_disallow_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        )
        .mount(&server)
        .await;

    let h = harness();
    let validator = h.crawler.frontier().validator();

    assert!(!validator
        .validate(&format!("{}/private/exam.pdf", server.uri()))
        .await
        .unwrap());
    assert!(validator
        .validate(&format!("{}/public/exam.pdf", server.uri()))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_non_200_is_recorded_without_following_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/~foo/gone.html"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string(r#"<html><body><a href="other.html">x</a></body></html>"#),
        )
        .mount(&server)
        .await;

    let h = harness();
    let url = format!("{}/~foo/gone.html", server.uri());
    h.crawler
        .frontier()
        .add_urls(vec![FrontierEntry::new(url.as_str(), "", "")])
        .await
        .unwrap();

    let entry = h.storage.get_frontier(&url).unwrap().unwrap();
    let outcome = h.crawler.process_entry(0, &entry).await.unwrap();

    assert_eq!(
        outcome,
        Outcome::Stored {
            status: 404,
            links_added: 0
        }
    );
    assert!(!h.storage.is_live(&url).unwrap());
    assert_eq!(h.storage.frontier_count().unwrap(), 1);
}

#[tokio::test]
async fn test_empty_frontier_until_insert() {
    let h = harness();
    let frontier = h.crawler.frontier();

    for _ in 0..3 {
        assert!(matches!(frontier.get_batch(10), Err(CrawlError::NoMoreWork)));
    }

    let added = frontier
        .add_urls(vec![FrontierEntry::new("http://127.0.0.1:9/~foo/", "", "")])
        .await
        .unwrap();
    assert_eq!(added, 1);

    let batch = frontier.get_batch(10).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].url, "http://127.0.0.1:9/~foo/");
}

#[tokio::test]
async fn test_resubmission_is_idempotent() {
    let h = harness();
    let frontier = h.crawler.frontier();
    let candidates = vec![
        FrontierEntry::new("http://127.0.0.1:9/~foo/a.pdf", "", ""),
        FrontierEntry::new("http://127.0.0.1:9/~foo/a.pdf#page=2", "", ""),
        FrontierEntry::new("http://127.0.0.1:9/~foo/b.pdf", "", ""),
    ];

    assert_eq!(frontier.add_urls(candidates.clone()).await.unwrap(), 2);
    assert_eq!(frontier.add_urls(candidates).await.unwrap(), 0);
    assert_eq!(h.storage.live_count().unwrap(), 2);
}

#[tokio::test]
async fn test_archive_seeding_follows_resume_keys() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cdx"))
        .and(query_param_is_missing("resumeKey"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[["original"],["http://127.0.0.1:9/~foo/a.pdf"],["http://127.0.0.1:9/~foo/b.pdf"],[],["next-page"]]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cdx"))
        .and(query_param("resumeKey", "next-page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[["original"],["http://127.0.0.1:9/~bar/c.pdf"]]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness_with(&format!(
        r#"
[archive]
endpoint = "{}/cdx"
prefixes = ["http://127.0.0.1:9/~"]
page-size = 2
"#,
        server.uri()
    ));

    assert_eq!(h.crawler.seed_archive().await, 3);
    for url in [
        "http://127.0.0.1:9/~foo/a.pdf",
        "http://127.0.0.1:9/~foo/b.pdf",
        "http://127.0.0.1:9/~bar/c.pdf",
    ] {
        assert!(h.storage.is_live(url).unwrap(), "{} should be live", url);
    }
    // Archive results are not expanded
    assert!(h.storage.get_frontier("http://127.0.0.1:9/~foo/").unwrap().is_none());
}
