// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use cmd::commands::put::PutSource;
use cmd::commands::{
    cat_command, exists_command, list_command, mkdir_command, put_command, rm_command,
    rmdir_command,
};
use cmd::common::UfsContext;
use tempfile::{TempDir, tempdir};
use unifs::Router;

/// Config file pointing the local root into a temp dir, one memory bucket
async fn setup(session: Option<&str>) -> Result<(TempDir, UfsContext, Router)> {
    let tmp = tempdir()?;
    let config_path = tmp.path().join("unifs.yaml");
    std::fs::write(
        &config_path,
        format!(
            "local:\n  root: '{}'\nremote:\n  buckets:\n    b: {{ url: 'memory://' }}\n",
            tmp.path().join("data").display()
        ),
    )?;
    let ctx = UfsContext::new(Some(config_path), session.map(String::from));
    let router = ctx.open_router().await?;
    Ok((tmp, ctx, router))
}

#[tokio::test]
async fn test_put_cat_rm() -> Result<()> {
    let (tmp, ctx, router) = setup(None).await?;
    let host = tmp.path().join("hello.txt");
    std::fs::write(&host, "hello")?;

    put_command(&router, ctx.session(), "local/greetings/hello.txt", &PutSource::File(host))
        .await?;

    let mut out = Vec::new();
    cat_command(&router, ctx.session(), "local/greetings/hello.txt", &mut out).await?;
    assert_eq!(out, b"hello");
    assert_eq!(
        std::fs::read(tmp.path().join("data/greetings/hello.txt"))?,
        b"hello"
    );

    rm_command(&router, ctx.session(), "local/greetings/hello.txt").await?;
    let mut out = Vec::new();
    let found = exists_command(&router, ctx.session(), "local/greetings/hello.txt", &mut out)
        .await?;
    assert!(!found);
    assert_eq!(out, b"false\n");
    Ok(())
}

#[tokio::test]
async fn test_mkdir_ls_rmdir() -> Result<()> {
    let (_tmp, ctx, router) = setup(None).await?;

    mkdir_command(&router, ctx.session(), "mem/docs").await?;
    mkdir_command(&router, ctx.session(), "mem/docs/drafts").await?;

    let mut out = Vec::new();
    list_command(&router, ctx.session(), "mem/docs/", &mut out).await?;
    assert_eq!(String::from_utf8(out)?, "drafts/\n");

    rmdir_command(&router, ctx.session(), "mem/docs/drafts").await?;
    let err = rmdir_command(&router, ctx.session(), "mem/docs/drafts")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("removing directory mem/docs/drafts"));
    Ok(())
}

#[tokio::test]
async fn test_remote_needs_session() -> Result<()> {
    let (_tmp, ctx, router) = setup(None).await?;
    let err = mkdir_command(&router, ctx.session(), "remote/b/dir")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<unifs::Error>(),
        Some(unifs::Error::PermissionDenied(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_remote_with_session() -> Result<()> {
    let (tmp, ctx, router) = setup(Some("token")).await?;
    let host = tmp.path().join("f.txt");
    std::fs::write(&host, "x")?;

    mkdir_command(&router, ctx.session(), "remote/b/dir").await?;
    put_command(&router, ctx.session(), "remote/b/dir/f.txt", &PutSource::File(host)).await?;

    let mut out = Vec::new();
    list_command(&router, ctx.session(), "remote/b/dir/", &mut out).await?;
    assert_eq!(String::from_utf8(out)?, "f.txt\n");

    let mut out = Vec::new();
    assert!(exists_command(&router, ctx.session(), "remote/b/dir/f.txt", &mut out).await?);
    router.settle().await;
    Ok(())
}

#[tokio::test]
async fn test_put_missing_host_file() -> Result<()> {
    let (tmp, ctx, router) = setup(None).await?;
    let err = put_command(
        &router,
        ctx.session(),
        "local/x.txt",
        &PutSource::File(tmp.path().join("absent")),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("reading host file"));
    Ok(())
}
