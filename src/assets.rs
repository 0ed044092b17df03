//! Read-only static file host for the simulation viewer.
//!
//! Each simulation instance gets one. A browser pointed at
//! `http://<host>:<asset port>/<viewer page>?port=<bridge port>` loads the
//! visual simulation, which then attaches to the bridge.

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to bind asset host on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

#[derive(Debug)]
struct AssetRoot {
    dir: PathBuf,
    index: String,
}

#[derive(Debug)]
pub struct AssetHost {
    local_addr: SocketAddr,
    viewer_page: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AssetHost {
    pub async fn start(addr: &str, dir: PathBuf, viewer_page: String) -> Result<Self, AssetError> {
        let bind_error = |source| AssetError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        if !dir.is_dir() {
            warn!("Asset directory {} does not exist; viewer requests will 404", dir.display());
        }

        let root = Arc::new(AssetRoot {
            dir,
            index: viewer_page.clone(),
        });
        let app = Router::new().fallback(serve_asset).with_state(root);
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = signal.await;
            });
            if let Err(e) = server.await {
                error!("Asset host on {} failed: {}", local_addr, e);
            }
        });

        info!("🖼️  Fluid simulation web server started on http://{}", local_addr);
        Ok(Self {
            local_addr,
            viewer_page,
            shutdown: Some(shutdown),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL that opens the viewer wired to the given bridge port.
    pub fn viewer_url(&self, bridge_port: u16) -> String {
        format!(
            "http://{}/{}?port={}",
            self.local_addr,
            self.viewer_page.replace(' ', "%20"),
            bridge_port
        )
    }

    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.task).await;
        debug!("Asset host on {} stopped", self.local_addr);
    }
}

impl Drop for AssetHost {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

async fn serve_asset(State(root): State<Arc<AssetRoot>>, uri: Uri) -> Response {
    let Some(requested) = percent_decode(uri.path().trim_start_matches('/')) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let relative = if requested.is_empty() {
        root.index.clone()
    } else {
        requested
    };

    let path = Path::new(&relative);
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(root.dir.join(path)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(path))], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("Fluid%20Simulation.html").as_deref(), Some("Fluid Simulation.html"));
        assert_eq!(percent_decode("js/script.js").as_deref(), Some("js/script.js"));
        assert_eq!(percent_decode("bad%2"), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("js/script.js")), "text/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}
