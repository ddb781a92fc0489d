//! crit - rewrite an HTML document from stdin to stdout
//!
//! Usage: crit [--dedupe] [--skip-invalid] [--ext EXT] <assets-dir>

use anyhow::{bail, Context};
use crit_engine::{Config, Engine};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout carries the document
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::default();
    let mut dir = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dedupe" => config.stream.dedupe_regions = true,
            "--skip-invalid" => config.skip_invalid = true,
            "--ext" => {
                let extension = args.next().context("--ext needs a value")?;
                config = config.with_css_extension(&extension);
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ => dir = Some(arg),
        }
    }
    let dir = dir.context("usage: crit [--dedupe] [--skip-invalid] [--ext EXT] <assets-dir>")?;

    smol::block_on(async {
        let engine = Engine::discover(&dir, config)
            .await
            .with_context(|| format!("loading styles from {dir}"))?;
        let stats = engine
            .pipe(smol::Unblock::new(std::io::stdin()), smol::Unblock::new(std::io::stdout()))
            .await?;
        tracing::info!(
            "{} bytes in, {} bytes out, {} regions, {} tokens",
            stats.bytes_in,
            stats.bytes_out,
            stats.regions,
            stats.tokens
        );
        Ok::<(), anyhow::Error>(())
    })
}
