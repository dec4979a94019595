//! Connection lifecycle with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use tsdb_config::ConnectionConfig;

use crate::connection::{Connection, Connector, DbError};
use crate::error::{ClientError, ClientResult};

/// How many times to try connecting and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn once() -> Self {
        RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Blocking wait between connection attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Owns the single connection handle of a client.
///
/// At most one handle exists at a time. It is released by [`close`], by
/// [`mark_lost`] after a connection-level failure, or on drop.
///
/// [`close`]: ConnectionManager::close
/// [`mark_lost`]: ConnectionManager::mark_lost
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    conn: Option<Box<dyn Connection>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        ConnectionManager {
            config,
            connector,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            conn: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Open the connection, retrying per the policy.
    ///
    /// An already open handle is closed first.
    pub fn connect(&mut self) -> ClientResult<()> {
        self.close();

        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = DbError::connection("no attempt made");
        for attempt in 1..=attempts {
            match self.connector.connect(&self.config) {
                Ok(conn) => {
                    info!(
                        endpoint = %self.config.endpoint(),
                        database = %self.config.database(),
                        attempt,
                        "connected to TimescaleDB"
                    );
                    self.conn = Some(conn);
                    return Ok(());
                }
                Err(e) => {
                    debug!(
                        endpoint = %self.config.endpoint(),
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "connection attempt failed"
                    );
                    last_error = e;
                    if attempt < attempts {
                        self.sleeper.sleep(self.policy.delay);
                    }
                }
            }
        }

        warn!(
            endpoint = %self.config.endpoint(),
            attempts,
            error = %last_error,
            "giving up on TimescaleDB connection"
        );
        Err(ClientError::Connection {
            host: self.config.host().to_string(),
            port: self.config.port(),
            attempts,
            last_error: last_error.message,
        })
    }

    /// Whether a handle is currently held, without touching the server.
    pub fn has_handle(&self) -> bool {
        self.conn.is_some()
    }

    /// Probe the server with `SELECT 1`.
    ///
    /// A probe that fails at the connection level releases the handle.
    pub fn is_connected(&mut self) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        match conn.query("SELECT 1", &[]) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "connection probe failed");
                if e.is_connection() {
                    self.mark_lost();
                }
                false
            }
        }
    }

    /// The open handle, if any.
    pub fn connection_mut(&mut self) -> Option<&mut (dyn Connection + 'static)> {
        self.conn.as_deref_mut()
    }

    /// The open handle, or [`ClientError::NotConnected`].
    pub fn require(&mut self) -> ClientResult<&mut (dyn Connection + 'static)> {
        self.conn.as_deref_mut().ok_or(ClientError::NotConnected)
    }

    /// Release the handle after the session was lost.
    pub fn mark_lost(&mut self) {
        if self.conn.take().is_some() {
            warn!(endpoint = %self.config.endpoint(), "TimescaleDB connection lost");
        }
    }

    /// Close the connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!(endpoint = %self.config.endpoint(), "connection closed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
