//! Engine - Main entry point

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crit_css::{CssError, StyleLookup};
use crit_html::{CriticalStyleStream, CriticalStyleWriter, StreamStats};
use smol::io::{AsyncRead, AsyncWrite};

use crate::{discover_project_styles, Config, LookupHandle};

/// The critical CSS engine
pub struct Engine {
    config: Config,
    styles: LookupHandle,
    /// Where the styles were discovered, for rebuilds
    style_dir: Option<PathBuf>,
}

impl Engine {
    /// Create an engine over an already built lookup
    pub fn new(config: Config, lookup: StyleLookup) -> Self {
        tracing::info!(
            "crit Engine {} initialized ({} selectors)",
            crate::VERSION,
            lookup.selector_count()
        );
        Self {
            config,
            styles: LookupHandle::new(lookup),
            style_dir: None,
        }
    }

    /// Discover and compile the styles under `dir`
    pub async fn discover(dir: impl AsRef<Path>, config: Config) -> Result<Self, EngineError> {
        let dir = dir.as_ref().to_path_buf();
        let lookup = discover_project_styles(&dir, &config).await?;
        let mut engine = Self::new(config, lookup);
        engine.style_dir = Some(dir);
        Ok(engine)
    }

    /// Get engine configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn styles(&self) -> &LookupHandle {
        &self.styles
    }

    /// Fresh stream for one response, bound to the current lookup
    pub fn critical_stream(&self) -> CriticalStyleStream<Arc<StyleLookup>> {
        CriticalStyleStream::with_config(self.styles.current(), self.config.stream.clone())
    }

    pub fn critical_writer<W: io::Write>(&self, inner: W) -> CriticalStyleWriter<W, Arc<StyleLookup>> {
        CriticalStyleWriter::new(inner, self.critical_stream())
    }

    /// Rewrite a whole document held in memory
    pub fn rewrite(&self, html: &str) -> String {
        crit_html::rewrite_document(self.styles.current(), html)
    }

    /// Stream one response from `reader` to `writer`
    pub async fn pipe<R, W>(&self, reader: R, writer: W) -> Result<StreamStats, EngineError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        Ok(crit_html::pipe(reader, writer, self.critical_stream()).await?)
    }

    /// Recompile the discovered styles; on failure the old lookup stays
    pub async fn rebuild(&self) -> Result<(), EngineError> {
        let dir = self.style_dir.as_ref().ok_or(EngineError::NoStyleDirectory)?;
        match discover_project_styles(dir, &self.config).await {
            Ok(lookup) => {
                tracing::info!("Styles rebuilt: {} selectors", lookup.selector_count());
                self.styles.replace(lookup);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Style rebuild failed, keeping previous styles: {}", e);
                Err(e)
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default(), StyleLookup::new())
    }
}

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("CSS error: {0}")]
    Css(#[from] CssError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Engine was not created from a style directory")]
    NoStyleDirectory,
}
