//! Test utilities for bluelink-client
//!
//! Runs stub brand backends on a random local port so whole login and
//! refresh sequences can be exercised without the real services.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bluelink_core::{Brand, Region};
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::environment::{BrandEnvironment, StampProvider, StaticStamp};
use crate::Result;

/// A stub backend that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on 127.0.0.1 with an OS-assigned port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::{routing::post, Json, Router};
    /// use bluelink_client::testing::TestServer;
    ///
    /// let router = Router::new().route(
    ///     "/api/v1/user/oauth2/token",
    ///     post(|| async { Json(serde_json::json!({ "access_token": "a" })) }),
    /// );
    /// let server = TestServer::start(router).await?;
    /// let env = server.environment(Brand::Hyundai, Region::Eu)?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Brand environment whose API, login form and identity provider hosts
    /// all point at this server
    pub fn environment(&self, brand: Brand, region: Region) -> Result<BrandEnvironment> {
        self.environment_with_stamp(brand, region, Arc::new(StaticStamp::new("test-stamp")))
    }

    pub fn environment_with_stamp(
        &self,
        brand: Brand,
        region: Region,
        stamp: Arc<dyn StampProvider>,
    ) -> Result<BrandEnvironment> {
        let base = self.base_url();
        Ok(BrandEnvironment::new(brand, region, stamp)?
            .with_base_url(&base)?
            .with_login_form_host(&base)?
            .with_idp_host(&base)?)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Records which stub endpoints were hit, in order
///
/// Clone it into axum state; every clone shares the same log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    /// Number of recorded calls named `call`
    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}
