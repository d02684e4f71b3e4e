// src/api/http.rs

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::{ControlPlane, ServiceStatus, StatusBoard};
use crate::config::Environment;
use crate::errors::{Result, SupervisorError};

/// HTTP control plane.
///
/// Routes:
/// - `GET /api/services`: JSON array of `{ "name", "state" }`;
/// - everything else: static files from the assets directory, if any.
///
/// The server task is aborted when this value is dropped.
#[derive(Debug)]
pub struct HttpControlPlane {
    addr: String,
    assets: Option<PathBuf>,
    status: StatusBoard,
    local_addr: Option<SocketAddr>,
    server: Option<JoinHandle<()>>,
}

impl HttpControlPlane {
    pub fn new(env: &Environment, status: StatusBoard) -> Self {
        Self {
            addr: env.listen_addr(),
            assets: None,
            status,
            local_addr: None,
            server: None,
        }
    }

    pub fn with_assets(mut self, assets: Option<PathBuf>) -> Self {
        self.assets = assets;
        self
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl ControlPlane for HttpControlPlane {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let listener = TcpListener::bind(self.addr.as_str())
                .await
                .map_err(|source| SupervisorError::ControlPlaneBind {
                    addr: self.addr.clone(),
                    source,
                })?;

            self.local_addr = listener.local_addr().ok();
            info!(addr = ?self.local_addr, "control plane listening");

            let app = router(self.status.clone(), self.assets.clone());
            self.server = Some(tokio::spawn(async move {
                if let Err(err) = axum::serve(listener, app).await {
                    error!(error = %err, "control plane server failed");
                }
            }));

            Ok(())
        })
    }
}

impl Drop for HttpControlPlane {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Build the control plane's router.
pub fn router(status: StatusBoard, assets: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/api/services", get(list_services))
        .with_state(status);

    let app = match assets {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(TraceLayer::new_for_http())
}

async fn list_services(State(status): State<StatusBoard>) -> Json<Vec<ServiceStatus>> {
    Json(status.snapshot())
}
