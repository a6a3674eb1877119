//! Workspace, GitHub and Teams calls against local stub servers.

use dbxops::client::{JobsApi, WorkspaceApi};
use dbxops::notify::TeamsNotifier;
use dbxops::publish::{publish_file, PublishTarget};
use dbxops::{DatabricksClient, Error};
use dbxops_protocol::jobs::{QueueSettings, RunNowRequest};
use dbxops_protocol::ObjectType;
use dbxops_security::GithubClient;
use std::io::Read;
use std::thread;
use tiny_http::{Header, Response, Server};

#[derive(Debug)]
struct Captured {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Serve the given responses in order, one per request, then stop.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<Captured>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let Ok(mut request) = server.recv() else { break };
            let mut req_body = String::new();
            let _ = request.as_reader().read_to_string(&mut req_body);
            captured.push(Captured {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.as_str().as_str().to_string(), h.value.as_str().to_string()))
                    .collect(),
                body: req_body,
            });
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(content_type);
            let _ = request.respond(response);
        }
        captured
    });
    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn workspace_list_sends_bearer_and_path() {
    let (base, handle) = serve(vec![(
        200,
        r#"{"objects":[{"path":"/Shared/wheels/runner-1.0.0-py3-none-any.whl","object_type":"FILE","created_at":1700000000000}]}"#,
    )]);
    let client = DatabricksClient::new(&base, "dapi-token");

    let objects = client.list("/Shared/wheels").await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].object_type, ObjectType::File);
    assert_eq!(objects[0].created_at, Some(1_700_000_000_000));

    let captured = handle.join().unwrap();
    assert_eq!(captured[0].method, "GET");
    assert_eq!(captured[0].url, "/api/2.0/workspace/list?path=%2FShared%2Fwheels");
    assert_eq!(captured[0].header("authorization"), Some("Bearer dapi-token"));
}

#[tokio::test]
async fn empty_listing_is_no_objects() {
    let (base, handle) = serve(vec![(200, "{}")]);
    let client = DatabricksClient::new(&base, "t");

    assert!(client.list("/Shared/empty").await.unwrap().is_empty());
    handle.join().unwrap();
}

#[tokio::test]
async fn non_success_status_is_http_error() {
    let (base, handle) = serve(vec![(
        400,
        r#"{"error_code":"RESOURCE_ALREADY_EXISTS","message":"exists"}"#,
    )]);
    let client = DatabricksClient::new(&base, "t");

    let err = client.mkdirs("/Shared/wheels").await.unwrap_err();
    match err {
        Error::Http {
            method,
            status,
            body,
            url,
        } => {
            assert_eq!(method, "POST");
            assert_eq!(status, 400);
            assert!(body.contains("RESOURCE_ALREADY_EXISTS"));
            assert!(url.ends_with("/api/2.0/workspace/mkdirs"));
        }
        other => panic!("expected Http error, got {:?}", other),
    }
    handle.join().unwrap();
}

#[tokio::test]
async fn run_now_posts_queue_settings() {
    let (base, handle) = serve(vec![(200, r#"{"run_id":4242}"#)]);
    let client = DatabricksClient::new(&base, "t");

    let run_id = client
        .run_now(&RunNowRequest {
            job_id: 17,
            queue: Some(QueueSettings { enabled: true }),
        })
        .await
        .unwrap();
    assert_eq!(run_id, 4242);

    let captured = handle.join().unwrap();
    assert_eq!(captured[0].url, "/api/2.1/jobs/run-now");
    let body = captured[0].json();
    assert_eq!(body["job_id"], 17);
    assert_eq!(body["queue"]["enabled"], true);
}

#[tokio::test]
async fn find_job_by_name() {
    let (base, handle) = serve(vec![
        (200, r#"{"jobs":[{"job_id":31,"settings":{"name":"nightly"}}]}"#),
        (200, "{}"),
    ]);
    let client = DatabricksClient::new(&base, "t");

    assert_eq!(client.find_job_id("nightly").await.unwrap(), Some(31));
    assert_eq!(client.find_job_id("missing").await.unwrap(), None);

    let captured = handle.join().unwrap();
    assert_eq!(captured[0].url, "/api/2.1/jobs/list?name=nightly");
}

#[tokio::test]
async fn publish_creates_missing_file_without_sha() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("report.html");
    std::fs::write(&source, "<html></html>").unwrap();

    let (base, handle) = serve(vec![(404, r#"{"message":"Not Found"}"#), (201, "{}")]);
    let client = GithubClient::with_api_url(&base, "ghs_token");
    let target = PublishTarget {
        org: "acme".into(),
        repo: "dbt-docs".into(),
        branch: "github_pages".into(),
        directory: "benchmark/".into(),
    };

    let outcome = publish_file(&client, &target, &source, "Publish report")
        .await
        .unwrap();
    assert_eq!(outcome.repo_path, "benchmark/report.html");
    assert!(!outcome.updated);

    let captured = handle.join().unwrap();
    assert_eq!(
        captured[0].url,
        "/repos/acme/dbt-docs/contents/benchmark/report.html?ref=github_pages"
    );
    assert_eq!(captured[1].method, "PUT");
    let body = captured[1].json();
    assert_eq!(body["branch"], "github_pages");
    assert!(body.get("sha").is_none());
}

#[tokio::test]
async fn publish_replaces_existing_file_with_sha() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("index.html");
    std::fs::write(&source, "v2").unwrap();

    let (base, handle) = serve(vec![
        (200, r#"{"sha":"abc123","path":"index.html"}"#),
        (200, "{}"),
    ]);
    let client = GithubClient::with_api_url(&base, "ghs_token");
    let target = PublishTarget {
        org: "acme".into(),
        repo: "dbt-docs".into(),
        branch: "main".into(),
        directory: String::new(),
    };

    let outcome = publish_file(&client, &target, &source, "Update docs")
        .await
        .unwrap();
    assert!(outcome.updated);

    let captured = handle.join().unwrap();
    assert_eq!(captured[1].json()["sha"], "abc123");
}

#[tokio::test]
async fn teams_card_and_rejection() {
    let (base, handle) = serve(vec![(200, "1"), (500, "boom")]);
    let notifier = TeamsNotifier::new(format!("{base}/webhook"));

    notifier
        .send("Benchmark 'full_load'", "DBT: ok\nDLT: ok", true)
        .await
        .unwrap();
    let err = notifier.send("Benchmark", "failed", false).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 500, .. }));

    let captured = handle.join().unwrap();
    let card = captured[0].json();
    assert_eq!(card["@type"], "MessageCard");
    assert_eq!(card["text"], "DBT: ok<br>DLT: ok");
    assert_eq!(card["themeColor"], "2EB886");
    assert_eq!(captured[1].json()["themeColor"], "D40E0D");
}
