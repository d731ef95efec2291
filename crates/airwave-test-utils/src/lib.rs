//! Common test helpers for Airwave tests
//!
//! Provides condition-based waiting (no hardcoded sleeps), an RAII
//! test server, and an event collector for broadcast assertions.

use airwave_client::{Airwave, ClientError, StationEvent};
use airwave_server::{Server, ServerConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::timeout;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait for a boolean flag to become true
pub async fn wait_for_flag(flag: &AtomicBool, max_wait: Duration) -> bool {
    wait_for(
        || async { flag.load(Ordering::SeqCst) },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait with notification - more efficient than polling
pub async fn wait_with_notify(notify: &Notify, max_wait: Duration) -> bool {
    timeout(max_wait, notify.notified()).await.is_ok()
}

// ============================================================================
// Test Server - RAII wrapper with proper cleanup
// ============================================================================

/// A test server that automatically shuts down on drop
pub struct TestServer {
    port: u16,
    server: Arc<Server>,
    handle: Option<tokio::task::JoinHandle<()>>,
    ready: Arc<AtomicBool>,
}

impl TestServer {
    /// Start a test server with default configuration
    pub async fn start() -> Self {
        Self::start_with_config(ServerConfig {
            name: "Test Server".to_string(),
            max_sessions: 100,
        })
        .await
    }

    /// Start a test server with custom configuration
    pub async fn start_with_config(config: ServerConfig) -> Self {
        let port = find_available_port().await;
        let addr = format!("127.0.0.1:{}", port);
        let ready = Arc::new(AtomicBool::new(false));
        let ready_clone = ready.clone();

        let server = Arc::new(Server::new(config));
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            ready_clone.store(true, Ordering::SeqCst);
            let _ = server_clone.serve_websocket(&addr).await;
        });

        // Wait until the port actually accepts connections
        let start = Instant::now();
        while !ready.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let _ = wait_for(
            || {
                let port = port;
                async move {
                    tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
                        .await
                        .is_ok()
                }
            },
            Duration::from_millis(10),
            Duration::from_secs(5),
        )
        .await;

        Self {
            port,
            server,
            handle: Some(handle),
            ready,
        }
    }

    /// Get the WebSocket URL for this server
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check if the server task started
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// The server behind this wrapper, for registry assertions
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Connect a client to this server
    pub async fn connect_client(&self) -> Result<Airwave, ClientError> {
        Airwave::connect_to(&self.url()).await
    }

    /// Connect a client with a custom name
    pub async fn connect_client_named(&self, name: &str) -> Result<Airwave, ClientError> {
        Airwave::builder(&self.url()).name(name).connect().await
    }

    /// Stop the server explicitly (also happens on drop)
    pub fn stop(&mut self) {
        self.server.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Event Collector - for verifying broadcasts
// ============================================================================

/// Collects station events received by a client, thread-safe
#[derive(Clone)]
pub struct EventCollector {
    events: Arc<parking_lot::Mutex<Vec<StationEvent>>>,
    notify: Arc<Notify>,
    count: Arc<AtomicU32>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(parking_lot::Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Create a callback for [`Airwave::on_event`]
    pub fn callback(&self) -> impl Fn(&StationEvent) + Send + Sync + 'static {
        let events = self.events.clone();
        let notify = self.notify.clone();
        let count = self.count.clone();

        move |event| {
            {
                let mut guard = events.lock();
                guard.push(event.clone());
            }
            count.fetch_add(1, Ordering::SeqCst);
            notify.notify_waiters();
        }
    }

    /// Get the count of received events
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait for at least n events to arrive
    pub async fn wait_for_count(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.count, n, max_wait).await
    }

    /// Wait until some collected event matches the predicate
    pub async fn wait_for_event<F>(&self, predicate: F, max_wait: Duration) -> bool
    where
        F: Fn(&StationEvent) -> bool,
    {
        let start = Instant::now();
        while start.elapsed() < max_wait {
            if self.events.lock().iter().any(&predicate) {
                return true;
            }
            tokio::time::sleep(DEFAULT_CHECK_INTERVAL).await;
        }
        false
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<StationEvent> {
        self.events.lock().clone()
    }

    /// Get the last event received
    pub fn last_event(&self) -> Option<StationEvent> {
        self.events.lock().last().cloned()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
        self.count.store(0, Ordering::SeqCst);
    }
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}
