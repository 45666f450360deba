// End-to-end download flow tests
// The bottle registry is a local mock or a raw TCP server; the event loop is
// driven by hand


use bottle_bomb::download::{self, DownloadRequest, partial_path, remove_partial};
use bottle_bomb::flow::{DownloadFlow, DownloadState, Effect, FlowEvent};
use bottle_bomb::platform::DownloadOption;
use bottle_bomb::{BottleError, Config};
use test_helpers::{AfterBody, TestEnvironment, formula, short_body_server};
use tokio::sync::mpsc;

fn request_for(option: &DownloadOption, name: &str, config: &Config) -> DownloadRequest {
    DownloadRequest {
        formula: name.to_string(),
        url: option.url.clone(),
        sha256: option.sha256.clone(),
        destination: config.destination_for(name),
        token: config.registry_token.clone(),
        verify_checksum: config.verify_checksum,
    }
}

/// Run the download for the first option, feeding every message into the
/// flow. Returns the progress fractions the flow saw.
async fn download_first(flow: &mut DownloadFlow, config: &Config) -> Vec<f64> {
    let option = match flow.handle(FlowEvent::Confirm(0)) {
        Some(Effect::StartDownload(option)) => option,
        other => panic!("expected StartDownload, got {:?}", other),
    };

    let request = request_for(&option, &flow.formula().name, config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = download::spawn_download(reqwest::Client::new(), request, tx);

    let mut fractions = Vec::new();
    while let Some(event) = rx.recv().await {
        let effect = flow.handle(event);
        if let Some(fraction) = flow.progress().and_then(|s| s.fraction()) {
            fractions.push(fraction);
        }
        if effect == Some(Effect::Exit) {
            break;
        }
    }

    task.await.unwrap();
    fractions
}

#[tokio::test]
async fn test_jq_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let payload = vec![0x1fu8; 120];
    let mock = server
        .mock("GET", "/v2/homebrew/core/jq/blobs/sha256:abc")
        .match_header("authorization", "Bearer QQ==")
        .with_status(200)
        .with_body(payload.clone())
        .create_async()
        .await;

    let env = TestEnvironment::new();
    let config = env.config("http://unused.invalid");
    let url = format!("{}/v2/homebrew/core/jq/blobs/sha256:abc", server.url());
    let mut flow = DownloadFlow::new(formula("jq", &[("arm64_sonoma", url.as_str(), "abc")]));

    let labels: Vec<_> = flow.options().iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["macOS Sonoma (arm64)"]);

    let fractions = download_first(&mut flow, &config).await;
    mock.assert_async().await;

    assert!(!fractions.is_empty());
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));

    match flow.state() {
        DownloadState::Done { path, bytes } => {
            assert_eq!(*bytes, 120);
            assert_eq!(path, &env.output.join("jq.tar.gz"));
        }
        other => panic!("expected Done, got {:?}", other),
    }

    let written = std::fs::read(env.output.join("jq.tar.gz")).unwrap();
    assert_eq!(written, payload);
    assert!(!partial_path(&env.output.join("jq.tar.gz")).exists());
}

#[tokio::test]
async fn test_existing_bottle_is_overwritten() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/bottle")
        .with_status(200)
        .with_body("fresh")
        .create_async()
        .await;

    let env = TestEnvironment::new();
    let config = env.config("http://unused.invalid");
    std::fs::write(env.output.join("wget.tar.gz"), b"stale contents").unwrap();

    let url = format!("{}/bottle", server.url());
    let mut flow = DownloadFlow::new(formula("wget", &[("x86_64_linux", url.as_str(), "")]));
    download_first(&mut flow, &config).await;

    assert!(matches!(flow.state(), DownloadState::Done { .. }));
    assert_eq!(
        std::fs::read(env.output.join("wget.tar.gz")).unwrap(),
        b"fresh"
    );
}

#[tokio::test]
async fn test_registry_error_fails_the_flow() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/bottle")
        .with_status(401)
        .create_async()
        .await;

    let env = TestEnvironment::new();
    let config = env.config("http://unused.invalid");
    let url = format!("{}/bottle", server.url());
    let mut flow = DownloadFlow::new(formula("jq", &[("arm64_linux", url.as_str(), "abc")]));

    let fractions = download_first(&mut flow, &config).await;
    assert!(fractions.is_empty());

    match flow.state() {
        DownloadState::Failed(BottleError::FetchError { status, .. }) => {
            assert_eq!(status, "401 Unauthorized");
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(!env.output.join("jq.tar.gz").exists());
}

#[tokio::test]
async fn test_checksum_mismatch_when_verifying() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/bottle")
        .with_status(200)
        .with_body("not what the formula promised")
        .create_async()
        .await;

    let env = TestEnvironment::new();
    let config = env.config("http://unused.invalid").with_verify(true);
    let url = format!("{}/bottle", server.url());
    let mut flow = DownloadFlow::new(formula("jq", &[("arm64_sonoma", url.as_str(), "abc")]));

    download_first(&mut flow, &config).await;

    assert!(matches!(
        flow.state(),
        DownloadState::Failed(BottleError::ChecksumMismatch { .. })
    ));
    let destination = env.output.join("jq.tar.gz");
    assert!(!destination.exists());

    remove_partial(&destination).await.unwrap();
    assert!(!partial_path(&destination).exists());
}

#[tokio::test]
async fn test_truncated_body_fails_with_cause() {
    // 40 of the promised 120 bytes, then the server hangs up
    let server = short_body_server(120, 40, AfterBody::Close).await;

    let env = TestEnvironment::new();
    let config = env.config("http://unused.invalid");
    let mut flow = DownloadFlow::new(formula(
        "jq",
        &[("arm64_sonoma", server.url.as_str(), "abc")],
    ));

    let fractions = download_first(&mut flow, &config).await;
    assert!(fractions.iter().all(|f| *f < 1.0));

    match flow.state() {
        DownloadState::Failed(err) => {
            let BottleError::NetworkError(inner) = err else {
                panic!("expected NetworkError, got {:?}", err);
            };
            // Every underlying cause reaches the rendered message
            let message = err.to_string();
            let mut cause = std::error::Error::source(inner);
            assert!(cause.is_some(), "truncation should carry a cause");
            while let Some(c) = cause {
                assert!(
                    message.contains(&c.to_string()),
                    "{:?} missing from {:?}",
                    c.to_string(),
                    message
                );
                cause = c.source();
            }
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    let destination = env.output.join("jq.tar.gz");
    assert!(!destination.exists());
    assert!(partial_path(&destination).exists());

    remove_partial(&destination).await.unwrap();
    assert!(!partial_path(&destination).exists());
}
