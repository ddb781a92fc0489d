//! Engine Configuration

use crit_css::LookupOptions;
use crit_html::StreamConfig;

/// Engine configuration options
#[derive(Debug, Clone)]
pub struct Config {
    /// Extension of the style files picked up by discovery
    pub css_extension: String,

    /// Log and skip style files that fail to parse
    pub skip_invalid: bool,

    /// Compile style files without the strict validation pass
    pub skip_validation: bool,

    /// Settings for every response stream
    pub stream: StreamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            css_extension: "css".to_string(),
            skip_invalid: false,
            skip_validation: false,
            stream: StreamConfig::default(),
        }
    }
}

impl Config {
    pub fn with_css_extension(mut self, extension: &str) -> Self {
        self.css_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_skip_invalid(mut self, skip: bool) -> Self {
        self.skip_invalid = skip;
        self
    }

    pub fn with_skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn lookup_options(&self) -> LookupOptions {
        LookupOptions {
            skip_invalid: self.skip_invalid,
            skip_validation: self.skip_validation,
        }
    }
}
