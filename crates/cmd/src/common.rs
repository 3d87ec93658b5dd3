// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use std::path::PathBuf;
use unifs::{Router, Session, StoreConfig};

/// Everything a command needs to reach the router
#[derive(Debug, Clone, Default)]
pub struct UfsContext {
    /// YAML configuration; defaults apply when absent
    pub config_path: Option<PathBuf>,

    pub session: Option<Session>,
}

impl UfsContext {
    pub fn new(config_path: Option<PathBuf>, session: Option<String>) -> Self {
        Self {
            config_path,
            session: session.filter(|s| !s.is_empty()).map(Session::new),
        }
    }

    pub fn load_config(&self) -> Result<StoreConfig> {
        let config = match &self.config_path {
            Some(path) => StoreConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => StoreConfig::default(),
        };
        Ok(config.with_env_overrides())
    }

    pub async fn open_router(&self) -> Result<Router> {
        let config = self.load_config()?;
        Router::from_config(&config)
            .await
            .context("opening storage backends")
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}
