// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use unifs::{Router, Session};

pub async fn mkdir_command(router: &Router, session: Option<&Session>, path: &str) -> Result<()> {
    // Directories are addressed with a trailing slash
    let dir = if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    };
    router
        .mkdir(&dir, session)
        .await
        .with_context(|| format!("creating directory {path}"))?;
    diagnostics::info!("Directory created: {path}", path: dir.as_str());
    Ok(())
}
