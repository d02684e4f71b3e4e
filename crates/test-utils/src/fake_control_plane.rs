use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pocket_cloud_server::api::ControlPlane;
use pocket_cloud_server::errors::{Result, SupervisorError};

/// A control plane that only records whether it was started, or fails to
/// "bind" when built with `failing()`.
#[derive(Clone, Default)]
pub struct FakeControlPlane {
    started: Arc<AtomicBool>,
    fail: bool,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            started: Arc::new(AtomicBool::new(false)),
            fail: true,
        }
    }

    pub fn was_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl ControlPlane for FakeControlPlane {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.fail {
                return Err(SupervisorError::ControlPlaneBind {
                    addr: "127.0.0.1:3080".to_string(),
                    source: io::Error::new(io::ErrorKind::AddrInUse, "fake: address in use"),
                });
            }
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}
