//! crit Engine
//!
//! Critical CSS for server-rendered HTML: compiles a project's built
//! stylesheets once, then rewrites each response so its `<style>` regions
//! carry only the rules the markup can use.
//!
//! # Example
//! ```rust,ignore
//! use crit_engine::{Config, Engine};
//!
//! let engine = Engine::discover("build/assets", Config::default()).await?;
//! let stats = engine.pipe(request_body, response_body).await?;
//! ```

mod config;
mod discovery;
mod engine;
mod handle;

pub use config::Config;
pub use discovery::{discover_project_styles, load_style_definitions, read_style_files};
pub use engine::{Engine, EngineError};
pub use handle::LookupHandle;

// Re-export sub-crates for advanced usage
pub use crit_css as css;
pub use crit_html as html;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
