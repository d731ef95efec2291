//! Client builder pattern

use std::time::Duration;

use crate::{Airwave, Result};

/// Builder for the Airwave client
pub struct AirwaveBuilder {
    url: String,
    name: String,
    request_timeout: Duration,
}

impl AirwaveBuilder {
    /// Create a new builder
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            name: "Airwave Client".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Set client display name
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Timeout applied to acked requests (create, join, listing)
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build and connect
    pub async fn connect(self) -> Result<Airwave> {
        let mut client = Airwave::new(&self.url, self.name, self.request_timeout);
        client.do_connect().await?;
        Ok(client)
    }
}
