// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use unifs::{Router, Session};

/// Where `put` takes its content from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutSource {
    Stdin,
    File(std::path::PathBuf),
}

impl PutSource {
    /// `-` means standard input
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdin
        } else {
            Self::File(arg.into())
        }
    }

    async fn read(&self) -> Result<Bytes> {
        match self {
            Self::Stdin => {
                let mut buf = Vec::new();
                _ = tokio::io::stdin()
                    .read_to_end(&mut buf)
                    .await
                    .context("reading standard input")?;
                Ok(Bytes::from(buf))
            }
            Self::File(host) => {
                let data = tokio::fs::read(host)
                    .await
                    .with_context(|| format!("reading host file {}", host.display()))?;
                Ok(Bytes::from(data))
            }
        }
    }
}

pub async fn put_command(
    router: &Router,
    session: Option<&Session>,
    path: &str,
    source: &PutSource,
) -> Result<()> {
    let content = source.read().await?;
    let size = content.len();
    router
        .write_file(path, content, session)
        .await
        .with_context(|| format!("writing {path}"))?;
    diagnostics::info!("Wrote {size} bytes to {path}", size: size, path: path);
    Ok(())
}
