use std::{
    io::Read,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use tiny_http::{Header, Response, Server};

use super::session::capture_cookie;
use super::*;
use crate::config::{Credentials, RemoteConfig};
use crate::graph::{TaskKind, TaskOptions};

#[derive(Debug, Clone)]
struct Recorded {
    url: String,
    method: String,
    cookie: Option<String>,
    csrf: Option<String>,
    body: String,
}

type Handler = Box<dyn FnMut(&Recorded) -> Response<std::io::Cursor<Vec<u8>>> + Send>;

/// Serve requests with `handler` until idle for a second.
fn serve(mut handler: Handler) -> (String, Arc<Mutex<Vec<Recorded>>>, JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);

    let handle = std::thread::spawn(move || {
        while let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(1)) {
            let header = |name: &'static str| {
                request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv(name))
                    .map(|h| h.value.as_str().to_string())
            };
            let mut recorded = Recorded {
                url: request.url().to_string(),
                method: request.method().to_string(),
                cookie: header("Cookie"),
                csrf: header("x-csrf-token"),
                body: String::new(),
            };
            request.as_reader().read_to_string(&mut recorded.body).unwrap();
            let response = handler(&recorded);
            seen.lock().push(recorded);
            let _ = request.respond(response);
        }
    });
    (format!("http://127.0.0.1:{port}"), log, handle)
}

fn json(body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_header(
        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
    )
}

fn login_reply(token: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    json(&format!("{{\"csrfToken\":\"{token}\"}}"))
        .with_header(Header::from_bytes(&b"Set-Cookie"[..], &b"theme=dark; Path=/"[..]).unwrap())
        .with_header(
            Header::from_bytes(&b"Set-Cookie"[..], &b"session_id=abc123; HttpOnly; Path=/"[..])
                .unwrap(),
        )
}

fn notifier(endpoint: &str) -> SessionNotifier {
    let remote = RemoteConfig {
        cookie: Some("session".into()),
        ..Default::default()
    };
    notifier_with(endpoint, &remote)
}

fn notifier_with(endpoint: &str, remote: &RemoteConfig) -> SessionNotifier {
    let credentials = Credentials {
        endpoint: endpoint.to_string(),
        username: "admin".into(),
        password: "secret".into(),
    };
    SessionNotifier::new(credentials, remote)
}

// ============================================================================
// session strategy
// ============================================================================

#[tokio::test]
async fn test_session_login_then_commands() {
    let (endpoint, log, handle) = serve(Box::new(|req| match req.url.as_str() {
        "/auth" => login_reply("tok1"),
        _ => json("{\"type\":\"success\",\"msg\":\"ok\"}"),
    }));

    notifier(&endpoint).reload("admin").await.unwrap();
    handle.join().unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].url, "/auth");
    assert_eq!(log[0].method, "POST");
    assert!(log[0].body.contains("\"username\":\"admin\""));

    let refresh = &log[1];
    assert_eq!(refresh.url, "/commands");
    assert_eq!(refresh.cookie.as_deref(), Some("session_id=abc123"));
    assert_eq!(refresh.csrf.as_deref(), Some("tok1"));
    assert!(refresh.body.contains("\"action\":\"refresh_res\""));

    let restart = &log[2];
    assert!(restart.body.contains("\"action\":\"restart_res\""));
    assert!(restart.body.contains("\"parameter\":\"admin\""));
}

#[tokio::test]
async fn test_session_relogin_after_unauthorized() {
    let logins = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let (l, r) = (Arc::clone(&logins), Arc::clone(&rejected));

    let (endpoint, log, handle) = serve(Box::new(move |req| {
        if req.url == "/auth" {
            let n = l.fetch_add(1, Ordering::SeqCst) + 1;
            return login_reply(&format!("tok{n}"));
        }
        // the first command hits an expired session
        if r.fetch_add(1, Ordering::SeqCst) == 0 {
            return Response::from_string("expired").with_status_code(401);
        }
        json("{\"type\":\"success\"}")
    }));

    let session = notifier(&endpoint);
    session.command("refresh_res", "").await.unwrap();
    handle.join().unwrap();

    assert_eq!(logins.load(Ordering::SeqCst), 2);
    let log = log.lock();
    let retried = log.last().unwrap();
    assert_eq!(retried.url, "/commands");
    assert_eq!(retried.csrf.as_deref(), Some("tok2"));
}

#[tokio::test]
async fn test_session_expired_logs_in_again() {
    let logins = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&logins);
    let (endpoint, log, handle) = serve(Box::new(move |req| {
        if req.url == "/auth" {
            let n = counted.fetch_add(1, Ordering::SeqCst) + 1;
            return login_reply(&format!("tok{n}"));
        }
        json("{\"type\":\"success\"}")
    }));

    // a zero lifetime expires every session before its next use
    let remote = RemoteConfig {
        cookie: Some("session".into()),
        session_ttl_secs: 0,
        ..Default::default()
    };
    notifier_with(&endpoint, &remote).reload("admin").await.unwrap();
    handle.join().unwrap();

    assert_eq!(logins.load(Ordering::SeqCst), 2);
    let urls: Vec<_> = log.lock().iter().map(|r| r.url.clone()).collect();
    assert_eq!(urls, vec!["/auth", "/commands", "/auth", "/commands"]);
    assert_eq!(log.lock()[3].csrf.as_deref(), Some("tok2"));
}

#[tokio::test]
async fn test_session_gives_up_after_one_retry() {
    let (endpoint, log, handle) = serve(Box::new(|req| match req.url.as_str() {
        "/auth" => login_reply("tok"),
        _ => Response::from_string("nope").with_status_code(403),
    }));

    let result = notifier(&endpoint).command("refresh_res", "").await;
    handle.join().unwrap();

    assert!(matches!(result, Err(ReloadError::Unauthorized(403))));
    let commands = log.lock().iter().filter(|r| r.url == "/commands").count();
    assert_eq!(commands, 2);
}

#[tokio::test]
async fn test_session_error_reply_is_rejected() {
    let (endpoint, _log, handle) = serve(Box::new(|req| match req.url.as_str() {
        "/auth" => login_reply("tok"),
        _ => json("{\"type\":\"error\",\"msg\":\"resource not found\"}"),
    }));

    let result = notifier(&endpoint).reload("ghost").await;
    handle.join().unwrap();

    match result {
        Err(ReloadError::Rejected(msg)) => assert_eq!(msg, "resource not found"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_session_bad_credentials() {
    let (endpoint, _log, handle) =
        serve(Box::new(|_| Response::from_string("denied").with_status_code(401)));

    let result = notifier(&endpoint).reload("admin").await;
    handle.join().unwrap();
    assert!(matches!(result, Err(ReloadError::Unauthorized(401))));
}

#[test]
fn test_capture_cookie() {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));
    headers.append(SET_COOKIE, HeaderValue::from_static("sid=xyz; HttpOnly"));

    assert_eq!(capture_cookie(&headers, None).as_deref(), Some("theme=dark"));
    assert_eq!(capture_cookie(&headers, Some("sid")).as_deref(), Some("sid=xyz"));
    assert_eq!(capture_cookie(&headers, Some("missing")), None);
    assert_eq!(capture_cookie(&HeaderMap::new(), None), None);
}

// ============================================================================
// local strategy
// ============================================================================

#[tokio::test]
async fn test_local_restart_url() {
    let (base, log, handle) = serve(Box::new(|_| Response::from_string("ok")));

    LocalNotifier::with_base(&base).reload("admin").await.unwrap();
    handle.join().unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].method, "POST");
    assert_eq!(log[0].url, "/restart?resource=admin");
}

#[tokio::test]
async fn test_local_nothing_listening_is_not_reachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let local = LocalNotifier::with_base(format!("http://127.0.0.1:{port}"));
    let result = local.reload("admin").await;
    assert!(matches!(result, Err(ReloadError::NotReachable(_))));
}

#[tokio::test]
async fn test_local_error_status() {
    let (base, _log, handle) =
        serve(Box::new(|_| Response::from_string("boom").with_status_code(500)));

    let result = LocalNotifier::with_base(&base).reload("admin").await;
    handle.join().unwrap();
    assert!(matches!(result, Err(ReloadError::Rejected(_))));
}

// ============================================================================
// notifier
// ============================================================================

#[derive(Default)]
struct Recording {
    core: bool,
    /// Identities answered with `NotReachable`.
    offline: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ReloadStrategy for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn supports_core(&self) -> bool {
        self.core
    }

    async fn reload(&self, identity: &str) -> Result<(), ReloadError> {
        self.calls.lock().push(identity.to_string());
        if self.offline.contains(&identity) {
            return Err(ReloadError::NotReachable("http://localhost:4414".into()));
        }
        Ok(())
    }
}

fn task(name: &str, kind: TaskKind) -> Arc<BuildTask> {
    Arc::new(BuildTask {
        name: name.into(),
        kind,
        source: name.into(),
        output: name.into(),
        options: TaskOptions {
            targets: Default::default(),
            minify: false,
            source_maps: false,
            compile: true,
            framework: None,
            entry: None,
        },
        compiler: None,
    })
}

#[tokio::test]
async fn test_notifier_reloads_each_identity_once() {
    let strategy = Arc::new(Recording::default());
    let notifier = Notifier::new(strategy.clone(), "core");

    let tasks = [
        task("admin", TaskKind::Resource),
        task("admin/ui", TaskKind::Views),
        task("chat", TaskKind::Resource),
    ];
    let statuses = notifier.rebuilt(&tasks).await;
    assert_eq!(*strategy.calls.lock(), vec!["admin", "chat"]);
    assert_eq!(
        statuses,
        vec![
            ("admin".to_string(), ReloadStatus::Restarted),
            ("chat".to_string(), ReloadStatus::Restarted),
        ]
    );
}

#[tokio::test]
async fn test_notifier_unreachable_instance_is_not_restarted() {
    let strategy = Arc::new(Recording {
        offline: vec!["chat"],
        ..Default::default()
    });
    let notifier = Notifier::new(strategy.clone(), "core");

    let statuses = notifier
        .rebuilt(&[task("admin", TaskKind::Resource), task("chat", TaskKind::Resource)])
        .await;
    assert_eq!(
        statuses,
        vec![
            ("admin".to_string(), ReloadStatus::Restarted),
            ("chat".to_string(), ReloadStatus::NotReachable),
        ]
    );
}

#[tokio::test]
async fn test_notifier_skips_core_without_support() {
    let strategy = Arc::new(Recording::default());
    let notifier = Notifier::new(strategy.clone(), "core");

    let statuses = notifier
        .rebuilt(&[task("core", TaskKind::Core), task("core/ui", TaskKind::Views)])
        .await;
    assert!(strategy.calls.lock().is_empty());
    assert_eq!(statuses, vec![("core".to_string(), ReloadStatus::Skipped)]);

    let strategy = Arc::new(Recording {
        core: true,
        ..Default::default()
    });
    Notifier::new(strategy.clone(), "core")
        .rebuilt(&[task("core/ui", TaskKind::Views)])
        .await;
    assert_eq!(*strategy.calls.lock(), vec!["core"]);
}

#[test]
fn test_select_strategy() {
    let mut config = crate::config::ProjectConfig::default();
    assert_eq!(select(&config).name(), "local");

    config.dev.remote.endpoint = Some("http://127.0.0.1:40120".into());
    config.dev.remote.username = Some("admin".into());
    assert_eq!(select(&config).name(), "local");

    config.dev.remote.password = Some("secret".into());
    assert_eq!(select(&config).name(), "session");
}
