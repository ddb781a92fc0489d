//! Style Discovery
//!
//! Finds the built style files of a project and compiles them into a
//! lookup. Filesystem work and compilation run on the blocking pool.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use crit_css::StyleLookup;

use crate::{Config, EngineError};

/// Compile every style file under `dir`, ordered by relative path
pub async fn discover_project_styles(
    dir: impl AsRef<Path>,
    config: &Config,
) -> Result<StyleLookup, EngineError> {
    let dir = dir.as_ref().to_path_buf();
    let extension = config.css_extension.clone();
    let options = config.lookup_options();

    smol::unblock(move || -> Result<StyleLookup, EngineError> {
        let sources = read_style_files(&dir, &extension)?;
        tracing::info!(
            "Discovered {} style files under {}",
            sources.len(),
            dir.display()
        );
        Ok(StyleLookup::from_sources_with(sources, &options)?)
    })
    .await
}

/// Compile `(name, css)` pairs produced by an async resolver
pub async fn load_style_definitions<F>(resolver: F, config: &Config) -> Result<StyleLookup, EngineError>
where
    F: Future<Output = io::Result<Vec<(String, String)>>>,
{
    let sources = resolver.await?;
    tracing::info!("Loading {} style definitions", sources.len());
    Ok(StyleLookup::from_sources_with(sources, &config.lookup_options())?)
}

/// Read matching files as `(relative name, contents)`, sorted by name
pub fn read_style_files(dir: &Path, extension: &str) -> io::Result<Vec<(String, String)>> {
    let mut named: Vec<(String, PathBuf)> = collect_files(dir, extension)?
        .into_iter()
        .map(|path| (relative_name(dir, &path), path))
        .collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));

    named
        .into_iter()
        .map(|(name, path)| {
            tracing::debug!("Reading {}", path.display());
            Ok((name, std::fs::read_to_string(&path)?))
        })
        .collect()
}

fn collect_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                found.push(path);
            }
        }
    }

    Ok(found)
}

/// `/`-separated path of `path` below `dir`
fn relative_name(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
