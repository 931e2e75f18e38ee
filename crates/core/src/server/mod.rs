//! Environment-profile static server
//!
//! Serves a profile's document roots with axum. Roots are searched in order and the
//! first one holding the requested file wins; when none does, the profile's middleware
//! may rewrite the path (history fallback) before giving up with 404.

pub mod livereload;
pub mod middleware;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub use livereload::{LiveReload, LIVERELOAD_PATH};
pub use middleware::{HistoryFallback, Middleware, MiddlewareFactory};

use crate::configs::env::ServerProfile;
use crate::types::{MarshalError, MarshalResult};

/// A running server
pub struct ServerHandle {
    name: String,
    addr: SocketAddr,
    ready_at: Instant,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Resolves once the settle delay since bind has elapsed
    pub async fn ready(&self) {
        tokio::time::sleep_until(self.ready_at).await;
        info!(server = %self.name, addr = %self.addr, "Server ready");
    }

    /// Stop accepting connections and wait for the server to finish
    pub async fn shutdown(mut self) -> MarshalResult<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.join.await {
            Ok(result) => result.map_err(MarshalError::from),
            Err(e) => Err(MarshalError::Command(format!(
                "Server '{}' stopped unexpectedly: {}",
                self.name, e
            ))),
        }
    }
}

/// Bind and start a static server for `profile`
pub async fn serve(profile: &ServerProfile, livereload: &LiveReload) -> MarshalResult<ServerHandle> {
    let listener = bind(&profile.host, profile.port).await?;

    let files = Arc::new(StaticFiles {
        roots: profile.document_roots.clone(),
        middleware: profile.middleware.build(),
    });
    let mut app = Router::new().fallback(serve_static).with_state(files);
    if profile.live_reload_enabled {
        app = app.merge(livereload.router());
    }

    start(profile.name.to_string(), listener, app, profile.wait_millis)
}

/// Standalone live-reload endpoint, used when the page server has live reload disabled
pub async fn listen_livereload(
    host: &str,
    port: u16,
    livereload: &LiveReload,
) -> MarshalResult<ServerHandle> {
    let listener = bind(host, port).await?;
    start("livereload".to_string(), listener, livereload.router(), None)
}

async fn bind(host: &str, port: u16) -> MarshalResult<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|source| MarshalError::PortBindFailed {
            host: host.to_string(),
            port,
            source,
        })
}

fn start(
    name: String,
    listener: TcpListener,
    app: Router,
    wait_millis: Option<u64>,
) -> MarshalResult<ServerHandle> {
    let addr = listener.local_addr()?;
    let ready_at = Instant::now() + Duration::from_millis(wait_millis.unwrap_or(0));
    let (tx, rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
    });

    info!(server = %name, %addr, "Server listening");
    Ok(ServerHandle {
        name,
        addr,
        ready_at,
        shutdown: Some(tx),
        join,
    })
}

struct StaticFiles {
    roots: Vec<PathBuf>,
    middleware: Vec<Middleware>,
}

impl StaticFiles {
    /// First root containing `request_path`; directories resolve to their index.html
    async fn lookup(&self, request_path: &str) -> Option<(PathBuf, Vec<u8>)> {
        let relative = sanitize(request_path)?;
        for root in &self.roots {
            let mut candidate = root.join(&relative);
            if tokio::fs::metadata(&candidate)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false)
            {
                candidate = candidate.join("index.html");
            }
            if let Ok(bytes) = tokio::fs::read(&candidate).await {
                return Some((candidate, bytes));
            }
        }
        None
    }
}

async fn serve_static(State(files): State<Arc<StaticFiles>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let accepts_html = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html") || accept.contains("*/*"))
        .unwrap_or(false);

    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    if let Some((file, bytes)) = files.lookup(&path).await {
        return file_response(&file, bytes);
    }

    for middleware in &files.middleware {
        if let Some(rewritten) = middleware.rewrite(&method, &path, accepts_html) {
            debug!(from = %path, to = %rewritten, "Rewriting request");
            if let Some((file, bytes)) = files.lookup(&rewritten).await {
                return file_response(&file, bytes);
            }
        }
    }

    StatusCode::NOT_FOUND.into_response()
}

fn file_response(file: &Path, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type(file))], bytes).into_response()
}

/// Percent-decoded request path as a relative path; `None` for attempts to leave the root
fn sanitize(request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for raw in request_path.split('/') {
        let segment = percent_decode_str(raw).decode_utf8().ok()?;
        match segment.as_ref() {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['/', '\\', '\0']) => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::env::ProfileName;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn profile(roots: Vec<PathBuf>) -> ServerProfile {
        ServerProfile {
            name: ProfileName::Dev,
            host: "127.0.0.1".to_string(),
            port: 0,
            document_roots: roots,
            wait_millis: None,
            live_reload_enabled: false,
            middleware: Arc::new(HistoryFallback::default()),
        }
    }

    /// Minimal HTTP/1.1 GET returning (status, body)
    async fn get(addr: SocketAddr, path: &str, accept: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nAccept: {}\r\nConnection: close\r\n\r\n",
            path, accept
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        let status = raw
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap();
        let body = raw
            .split_once("\r\n\r\n")
            .map(|(_, b)| b.to_string())
            .unwrap_or_default();
        (status, body)
    }

    fn site(dir: &Path) -> (PathBuf, PathBuf) {
        let first = dir.join("dist");
        let second = dir.join("build");
        std::fs::create_dir_all(first.join("js")).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(first.join("index.html"), "<html>dist</html>").unwrap();
        std::fs::write(first.join("js/app.js"), "console.log('dist');").unwrap();
        std::fs::write(second.join("js.txt"), "from build").unwrap();
        std::fs::write(second.join("index.html"), "<html>build</html>").unwrap();
        (first, second)
    }

    #[tokio::test]
    async fn test_serves_first_matching_root() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second) = site(dir.path());
        let handle = serve(&profile(vec![first, second]), &LiveReload::default())
            .await
            .unwrap();
        let addr = handle.local_addr();

        let (status, body) = get(addr, "/", "text/html").await;
        assert_eq!(status, 200);
        assert_eq!(body, "<html>dist</html>");

        let (status, body) = get(addr, "/js.txt", "*/*").await;
        assert_eq!(status, 200);
        assert_eq!(body, "from build");

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_history_fallback_and_missing_assets() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = site(dir.path());
        let handle = serve(&profile(vec![first]), &LiveReload::default())
            .await
            .unwrap();
        let addr = handle.local_addr();

        let (status, body) = get(addr, "/dashboard/settings", "text/html").await;
        assert_eq!(status, 200);
        assert_eq!(body, "<html>dist</html>");

        let (status, _) = get(addr, "/js/missing.js", "*/*").await;
        assert_eq!(status, 404);

        let (status, _) = get(addr, "/../secret", "text/html").await;
        assert_ne!(status, 500);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_port_in_use_reports_bind_failure() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let mut occupied = profile(vec![]);
        occupied.port = port;
        let err = serve(&occupied, &LiveReload::default()).await.err().unwrap();
        assert!(err.to_string().contains(&format!("127.0.0.1:{}", port)));

        match err {
            MarshalError::PortBindFailed { host, port: p, .. } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(p, port);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ready_waits_for_settle_delay() {
        let dir = tempfile::tempdir().unwrap();
        let mut delayed = profile(vec![dir.path().to_path_buf()]);
        delayed.wait_millis = Some(100);

        let started = Instant::now();
        let handle = serve(&delayed, &LiveReload::default()).await.unwrap();
        handle.ready().await;
        assert!(started.elapsed() >= Duration::from_millis(100));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_livereload_endpoint_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut with_reload = profile(vec![dir.path().to_path_buf()]);
        with_reload.live_reload_enabled = true;
        let livereload = LiveReload::default();

        let handle = serve(&with_reload, &livereload).await.unwrap();
        let addr = handle.local_addr();

        let poll = tokio::spawn(async move { get(addr, LIVERELOAD_PATH, "*/*").await });
        // Keep notifying until the poller has subscribed
        while livereload.notify("sass") == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let (status, body) = poll.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, "sass");

        handle.shutdown().await.unwrap();
    }

    #[test]
    fn test_sanitize_rejects_parent_segments() {
        assert_eq!(sanitize("/js/app.js"), Some(PathBuf::from("js/app.js")));
        assert_eq!(sanitize("/"), Some(PathBuf::new()));
        assert_eq!(sanitize("/a/../../etc/passwd"), None);
    }

    #[test]
    fn test_sanitize_decodes_segments() {
        assert_eq!(sanitize("/img/my%20logo.png"), Some(PathBuf::from("img/my logo.png")));
        assert_eq!(sanitize("/%2e%2e/secret"), None);
        assert_eq!(sanitize("/a%2F..%2F..%2Fsecret"), None);
        assert_eq!(sanitize("/a%5C..%5Csecret"), None);
        assert_eq!(sanitize("/bad%FF"), None);
    }

    #[tokio::test]
    async fn test_serves_percent_encoded_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("my logo.png"), "png").unwrap();
        let handle = serve(&profile(vec![dir.path().to_path_buf()]), &LiveReload::default())
            .await
            .unwrap();

        let (status, body) = get(handle.local_addr(), "/my%20logo.png", "*/*").await;
        assert_eq!(status, 200);
        assert_eq!(body, "png");

        handle.shutdown().await.unwrap();
    }
}
