//! Diagnostic messages emitted during resolution.
//!
//! Sinks are always optional. Messages are built lazily through `emit`, so
//! an absent sink costs one `Option` check.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, Level};

/// A resolution diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A name is being resolved for the first time.
    ResolutionAttempted { name: String },

    /// Resolution produced a loadable assembly.
    ResolutionSucceeded { name: String, path: PathBuf },

    /// Resolution found nothing; the request passes to the next resolver.
    ResolutionFailed { name: String },

    /// Free-form detail from a resolver step.
    Note { source: &'static str, message: String },
}

impl Diagnostic {
    pub fn note(source: &'static str, message: impl Into<String>) -> Self {
        Diagnostic::Note {
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ResolutionAttempted { name } => write!(f, "[resolve] Resolving '{}'", name),
            Diagnostic::ResolutionSucceeded { name, path } => {
                write!(f, "[resolve] '{}' resolved to '{}'", name, path.display())
            }
            Diagnostic::ResolutionFailed { name } => write!(
                f,
                "[resolve] '{}' not found, passed down to next resolver",
                name
            ),
            Diagnostic::Note { source, message } => write!(f, "[{}] {}", source, message),
        }
    }
}

/// Receiver of resolution diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn on_diagnostic(&self, diagnostic: &Diagnostic);
}

/// Sink that forwards diagnostics to `tracing`.
///
/// User-facing diagnostics log at info level; internal ones at debug.
#[derive(Debug, Clone)]
pub struct TracingDiagnostics {
    label: String,
    internal: bool,
}

impl TracingDiagnostics {
    /// `label` is typically the display name of the assembly under test.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            internal: false,
        }
    }

    /// Sink for internal diagnostics.
    pub fn internal(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            internal: true,
        }
    }

    pub fn level(&self) -> Level {
        if self.internal {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

impl DiagnosticSink for TracingDiagnostics {
    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        if self.internal {
            debug!(assembly = %self.label, "{}", diagnostic);
        } else {
            info!(assembly = %self.label, "{}", diagnostic);
        }
    }
}

/// Deliver a lazily built diagnostic if a sink is present.
pub(crate) fn emit(sink: Option<&dyn DiagnosticSink>, build: impl FnOnce() -> Diagnostic) {
    if let Some(sink) = sink {
        sink.on_diagnostic(&build());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingDiagnostics;

    #[test]
    fn test_display_formats() {
        let d = Diagnostic::ResolutionSucceeded {
            name: "Foo".to_string(),
            path: PathBuf::from("/p/Foo.dll"),
        };
        assert_eq!(d.to_string(), "[resolve] 'Foo' resolved to '/p/Foo.dll'");

        let d = Diagnostic::note("manifest", "skipping");
        assert_eq!(d.to_string(), "[manifest] skipping");
    }

    #[test]
    fn test_emit_without_sink_never_builds() {
        emit(None, || panic!("diagnostic must not be built without a sink"));
    }

    #[test]
    fn test_emit_with_sink_delivers() {
        let sink = RecordingDiagnostics::new();
        emit(Some(&sink), || Diagnostic::ResolutionFailed {
            name: "Bar".to_string(),
        });
        assert_eq!(sink.diagnostics().len(), 1);
    }

    #[test]
    fn test_tracing_levels() {
        assert_eq!(TracingDiagnostics::new("A").level(), Level::INFO);
        assert_eq!(TracingDiagnostics::internal("A").level(), Level::DEBUG);
        TracingDiagnostics::new("A").on_diagnostic(&Diagnostic::note("manifest", "shown at info"));
    }
}
