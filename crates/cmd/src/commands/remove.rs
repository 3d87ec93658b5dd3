// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use unifs::{Router, Session};

pub async fn rm_command(router: &Router, session: Option<&Session>, path: &str) -> Result<()> {
    router
        .delete_file(path, session)
        .await
        .with_context(|| format!("removing {path}"))?;
    diagnostics::info!("Removed {path}", path: path);
    Ok(())
}

pub async fn rmdir_command(router: &Router, session: Option<&Session>, path: &str) -> Result<()> {
    let dir = if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    };
    router
        .rmdir(&dir, session)
        .await
        .with_context(|| format!("removing directory {path}"))?;
    diagnostics::info!("Directory removed: {path}", path: dir.as_str());
    Ok(())
}
