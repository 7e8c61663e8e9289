use std::io::{Read, Write};
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};

const MAX_SCRIPT_BYTES: u64 = 1024 * 1024;

/// Downloads the script at `url` and runs it with `bash` inside `build_dir`,
/// attached to the operator's terminal.
pub async fn run_script(url: &str, build_dir: &Path) -> Result<ExitStatus> {
    ensure_https(url)?;

    let owned_url = url.to_string();
    let body = tokio::task::spawn_blocking(move || fetch(&owned_url))
        .await
        .context("script download task panicked")??;
    let digest = sha256_hex(&body);
    tracing::info!(url, bytes = body.len(), sha256 = %digest, "downloaded post-build script");
    println!("{}", download_summary(&body, &digest));

    let mut script = tempfile::Builder::new()
        .prefix("teemake-post-build-")
        .suffix(".sh")
        .tempfile()
        .context("failed to create a file for the post-build script")?;
    script
        .write_all(&body)
        .and_then(|()| script.flush())
        .context("failed to store the post-build script")?;

    let status = tokio::process::Command::new("bash")
        .arg(script.path())
        .current_dir(build_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .status()
        .await
        .context("failed to start bash for the post-build script")?;

    tracing::debug!(?status, "post-build script finished");
    Ok(status)
}

fn ensure_https(url: &str) -> Result<()> {
    if !url.starts_with("https://") {
        bail!("refusing to download a post-build script over a non-HTTPS URL: {url}");
    }
    Ok(())
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;

    read_script(response.into_reader(), MAX_SCRIPT_BYTES)
        .with_context(|| format!("failed to read the script from {url}"))
}

/// Reads a whole script, refusing empty bodies and anything over `limit`
/// bytes instead of cutting it short.
fn read_script(reader: impl Read, limit: u64) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .context("failed to read the response body")?;

    if body.len() as u64 > limit {
        bail!("script is larger than {limit} bytes");
    }
    if body.is_empty() {
        bail!("script is empty");
    }
    Ok(body)
}

fn download_summary(body: &[u8], digest: &str) -> String {
    format!("Downloaded post-build script ({} bytes, sha256 {digest})", body.len())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
