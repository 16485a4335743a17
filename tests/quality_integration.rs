//! Integration tests for direct delivery into the quality-ranked library.

use std::fs;
use std::path::Path;
use std::time::Duration;

use mediacrawl_core::crawl::RunState;
use mediacrawl_core::download::{AcquireOutcome, Destination, DirectHttpTool, Orchestrator};
use mediacrawl_core::fetch::{ClientSettings, HttpClient};
use mediacrawl_core::store::{DedupStore, Scope};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLAIN_1080: &str = "Film (2001) [1080p] [YTS.MX].torrent";
const X265_1080: &str = "Film (2001) [1080p] [x265] [YTS.MX].torrent";
const PLAIN_2160: &str = "Film (2001) [2160p] [YTS.MX].torrent";

async fn serve_artifact(server: &MockServer, route: &str, file_name: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    format!("attachment; filename=\"{file_name}\""),
                )
                .set_body_string("torrent-bytes"),
        )
        .mount(server)
        .await;
}

fn place(library: &Path, tier: &str, file_name: &str) -> std::path::PathBuf {
    let dir = library.join(tier);
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join(file_name);
    fs::write(&file, "old").unwrap();
    file
}

fn destination(library: &Path) -> Destination {
    Destination {
        output_dir: library.to_path_buf(),
        name_template: String::new(),
    }
}

#[tokio::test]
async fn test_efficient_release_replaces_plain_copy_after_store() {
    let server = MockServer::start().await;
    serve_artifact(&server, "/dl/x265", X265_1080).await;
    let dir = TempDir::new().unwrap();
    let library = dir.path().join("library").join("English");
    let old = place(&library, "1080p", PLAIN_1080);

    let client = HttpClient::new(&ClientSettings::default()).unwrap();
    let tool = DirectHttpTool::new(&client);
    let store = DedupStore::new(dir.path());
    let orchestrator = Orchestrator::new(&tool, &store).with_retry(1, Duration::ZERO);
    let mut state = RunState::new(None);
    let link = format!("{}/dl/x265", server.uri());

    let outcome = orchestrator
        .acquire(&link, &destination(&library), &mut state)
        .await;

    assert_eq!(outcome, AcquireOutcome::Saved);
    let stored = library.join("1080p.x265").join(X265_1080);
    assert_eq!(fs::read_to_string(&stored).unwrap(), "torrent-bytes");
    assert!(!old.exists(), "superseded copy should be deleted");
    assert!(store.exists(Scope::Downloaded, &link));
}

#[tokio::test]
async fn test_lower_resolution_is_skipped_when_better_copy_stored() {
    let server = MockServer::start().await;
    serve_artifact(&server, "/dl/plain", PLAIN_1080).await;
    let dir = TempDir::new().unwrap();
    let library = dir.path().join("library").join("English");
    let kept = place(&library, "2160p", PLAIN_2160);

    let client = HttpClient::new(&ClientSettings::default()).unwrap();
    let tool = DirectHttpTool::new(&client);
    let store = DedupStore::new(dir.path());
    let orchestrator = Orchestrator::new(&tool, &store).with_retry(1, Duration::ZERO);
    let mut state = RunState::new(None);
    let link = format!("{}/dl/plain", server.uri());

    let outcome = orchestrator
        .acquire(&link, &destination(&library), &mut state)
        .await;

    assert_eq!(outcome, AcquireOutcome::Skipped);
    assert!(kept.exists());
    assert!(!library.join("1080p").join(PLAIN_1080).exists());
    assert_eq!(state.totals().skipped, 1);
}
