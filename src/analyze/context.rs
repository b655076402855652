//! Shared state handed to the analyze handler.

use std::sync::Arc;

use reqwest::Client;

use super::client;
use crate::config::Settings;
use crate::error::AppResult;

/// Immutable per-process state: settings plus one pooled HTTP client.
#[derive(Clone)]
pub struct AnalyzeContext {
    pub settings: Arc<Settings>,
    pub client: Client,
}

impl AnalyzeContext {
    pub fn new(settings: Settings) -> AppResult<Self> {
        let client = client::create_client(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            client,
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from_settings(&self.settings)
    }
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 300,
            max_delay_ms: 3000,
        }
    }
}

impl RetryConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.retry_max_attempts.max(1),
            initial_delay_ms: settings.retry_initial_ms,
            max_delay_ms: settings.retry_max_ms,
        }
    }
}
