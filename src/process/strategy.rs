//! Launch command templates.

use std::fmt;
use std::path::Path;

/// Placeholder replaced by the resource path in every argument.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// One way of starting the external application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchStrategy {
    /// Program to execute.
    pub program: String,
    /// Argument templates.
    pub args: Vec<String>,
}

impl LaunchStrategy {
    /// Create a strategy from a program and argument templates.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a full argv. Returns `None` for an empty argv.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    /// Arguments with the resource path substituted.
    pub fn render_args(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(PATH_PLACEHOLDER, &path))
            .collect()
    }

    /// The built-in LibreOffice strategies, tried in order.
    pub fn defaults() -> Vec<LaunchStrategy> {
        vec![
            LaunchStrategy::new("libreoffice", [PATH_PLACEHOLDER]),
            LaunchStrategy::new("libreoffice", ["--writer", PATH_PLACEHOLDER]),
            LaunchStrategy::new("soffice", [PATH_PLACEHOLDER]),
        ]
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
