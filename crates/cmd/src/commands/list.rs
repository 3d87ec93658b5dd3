// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use std::io::Write;
use unifs::{Router, Session};

/// One entry per line, directories end with `/`
pub async fn list_command<W: Write>(
    router: &Router,
    session: Option<&Session>,
    path: &str,
    out: &mut W,
) -> Result<()> {
    let entries = router
        .list_files(path, session)
        .await
        .with_context(|| format!("listing {path}"))?;
    for entry in &entries {
        writeln!(out, "{entry}")?;
    }
    Ok(())
}

/// Prints `true` or `false`
pub async fn exists_command<W: Write>(
    router: &Router,
    session: Option<&Session>,
    path: &str,
    out: &mut W,
) -> Result<bool> {
    let found = router
        .exists(path, session)
        .await
        .with_context(|| format!("checking {path}"))?;
    writeln!(out, "{found}")?;
    Ok(found)
}
