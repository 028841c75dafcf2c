use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Locate an external tool on PATH (or accept an explicit path).
pub fn locate(command: &str) -> Result<PathBuf> {
    which::which(command).with_context(|| {
        format!("engine unavailable: `{command}` not found; install it or set its path in the config")
    })
}

/// Run `cmd args...`, feed `input` on stdin and collect stdout.
///
/// The child is killed if the returned future is dropped, so an enclosing
/// timeout does not leave it running.
pub async fn run_with_stdin(cmd: &str, args: &[String], input: Vec<u8>) -> Result<Vec<u8>> {
    let bin = locate(cmd)?;
    let mut child = tokio::process::Command::new(&bin)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning {cmd} {args:?}"))?;

    let mut stdin = child.stdin.take().context("missing stdin")?;
    let mut stdout = child.stdout.take().context("missing stdout")?;
    let mut stderr = child.stderr.take().context("missing stderr")?;

    // Write stdin in the background so a child that starts writing before
    // it has read everything cannot deadlock us.
    let writer = tokio::spawn(async move {
        let res = stdin.write_all(&input).await;
        drop(stdin);
        res
    });
    let (tx, rx) = tokio::sync::oneshot::channel::<String>();
    tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        let _ = tx.send(buf);
    });

    let mut out = Vec::new();
    stdout
        .read_to_end(&mut out)
        .await
        .with_context(|| format!("reading {cmd} stdout"))?;

    let status = child.wait().await.with_context(|| format!("waiting for {cmd}"))?;
    if !status.success() {
        let stderr_txt = rx.await.unwrap_or_default();
        bail!("{cmd} exited with {status}. stderr: {}", stderr_txt.trim());
    }
    writer
        .await
        .context("stdin writer task")?
        .with_context(|| format!("writing {cmd} stdin"))?;

    Ok(out)
}
