//! # Output Configuration
//!
//! Decorations for the human-readable reports of the `layer-depgraph`
//! binary: a status marker in front of each report line, and styles for
//! error categories, locations and the final summary.
//!
//! Whether decorations are used is decided once per invocation from the
//! global `--color` flag. `always` and `never` are taken as given. `auto`
//! honors, in this order, `NO_COLOR`, `CLICOLOR=0`, `CLICOLOR_FORCE`,
//! `TERM=dumb` and finally whether stdout is a color terminal.
//!
//! ## Usage
//!
//! ```rust
//! use layer_depgraph::output::{OutputConfig, Status};
//!
//! let out = OutputConfig::from_env_and_flag("never");
//! assert_eq!(Status::Failed.marker(&out), "[ERR]");
//! assert_eq!(out.category("conflict"), "[conflict]");
//! ```

use console::Style;
use std::env;

/// Kind of a line in a check report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A layer is about to be checked
    Scanning,
    /// The layer planned without problems
    Consistent,
    /// One problem found in the layer
    Failed,
}

impl Status {
    fn symbol(self) -> &'static str {
        match self {
            Self::Scanning => "🔍",
            Self::Consistent => "✅",
            Self::Failed => "❌",
        }
    }

    fn plain(self) -> &'static str {
        match self {
            Self::Scanning => "[SCAN]",
            Self::Consistent => "[OK]",
            Self::Failed => "[ERR]",
        }
    }

    /// The symbol when decorations are on, a bracketed tag otherwise.
    pub fn marker(self, out: &OutputConfig) -> &'static str {
        if out.use_color {
            self.symbol()
        } else {
            self.plain()
        }
    }
}

/// Decoration settings of one invocation.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and status symbols are used.
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag (`always`, `never` or `auto`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => terminal_wants_color(),
        };
        Self { use_color }
    }

    /// An error category, bracketed and in bold red.
    pub fn category(&self, category: &str) -> String {
        self.paint(&format!("[{}]", category), Style::new().red().bold())
    }

    /// The closing line of a consistent layer.
    pub fn success(&self, text: &str) -> String {
        self.paint(text, Style::new().green())
    }

    /// Source locations and feature ids.
    pub fn dim(&self, text: &str) -> String {
        self.paint(text, Style::new().dim())
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.use_color {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

fn terminal_wants_color() -> bool {
    // https://no-color.org/: presence alone disables, even when empty.
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}
