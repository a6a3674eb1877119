//! GitHub Actions workflow commands.
//!
//! Non-fatal findings (a version that is already deployed, a workflow that
//! does not exist) are surfaced as warning annotations on the CI run.

use std::sync::Mutex;

/// Receives warning annotations.
pub trait AnnotationSink: Send + Sync {
    fn warning(&self, title: &str, message: &str);
}

/// Prints `::warning title=...::...` to stdout, where the runner picks it up.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowCommands;

impl WorkflowCommands {
    pub fn format_warning(title: &str, message: &str) -> String {
        format!("::warning title={}::{}", title, message)
    }
}

impl AnnotationSink for WorkflowCommands {
    fn warning(&self, title: &str, message: &str) {
        tracing::warn!(title, "{}", message);
        println!("{}", Self::format_warning(title, message));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub title: String,
    pub message: String,
}

/// Keeps annotations in memory instead of printing them.
#[derive(Debug, Default)]
pub struct RecordedAnnotations {
    warnings: Mutex<Vec<Annotation>>,
}

impl RecordedAnnotations {
    pub fn warnings(&self) -> Vec<Annotation> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

impl AnnotationSink for RecordedAnnotations {
    fn warning(&self, title: &str, message: &str) {
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(Annotation {
                title: title.to_string(),
                message: message.to_string(),
            });
        }
    }
}
