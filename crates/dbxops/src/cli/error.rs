//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                "TRY: Relative paths are resolved against $GITHUB_WORKSPACE when it is set".to_string(),
            ])
    }

    pub fn directory_not_found(path: &Path) -> Self {
        Self::new(format!("Directory not found: {}", path.display()))
            .with_context("The configuration directory does not exist")
            .with_suggestions([
                format!("TRY: Check the path: ls -la {}", path.display()),
                "TRY: Pass the directory explicitly: dbxops validate-config --config-dir ./config".to_string(),
            ])
    }

    /// The workspace rejected or never issued a token.
    pub fn authentication_failed(host: &str, reason: &str) -> Self {
        Self::new(format!("Could not authenticate against {}", host))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Check CLIENT_ID and CLIENT_SECRET for the service principal".to_string(),
                "TRY: Azure workspaces also need AZURE_TENANT_ID".to_string(),
                "TRY: Verify the service principal is added to the workspace".to_string(),
            ])
    }

    pub fn benchmark_store_missing(path: &Path) -> Self {
        Self::new(format!("Benchmark store not found: {}", path.display()))
            .with_context("Run configurations are created by 'benchmark setup'")
            .with_suggestion(format!(
                "TRY: dbxops benchmark setup --plan benchmark.yml --db {}",
                path.display()
            ))
    }

    pub fn invalid_github_key(reason: &str) -> Self {
        Self::new("GitHub App private key could not be used")
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Pass the PEM text, not a file path, in GITHUB_APP_PRIVATE_KEY".to_string(),
                "TRY: The key must be the RSA key generated for the GitHub App".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
