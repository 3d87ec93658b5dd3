// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use std::io::Write;
use unifs::{Router, Session};

/// Copy a file's content to `out`
pub async fn cat_command<W: Write>(
    router: &Router,
    session: Option<&Session>,
    path: &str,
    out: &mut W,
) -> Result<()> {
    let content = router
        .read_file(path, session)
        .await
        .with_context(|| format!("reading {path}"))?;
    out.write_all(&content)?;
    out.flush()?;
    diagnostics::debug!("cat {path}: {size} bytes", path: path, size: content.len());
    Ok(())
}
