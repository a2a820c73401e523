//! Accumulating diagnostics sink.
//!
//! Diagnostics are recoverable by definition: the compiler records them and
//! keeps going. Fatal misuse of the builder API panics instead.

use crate::node::NodeId;

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

/// One reported message, optionally keyed to a node.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub node: Option<NodeId>,
}

/// An accumulating error/warning sink.
///
/// The compiler driver clears the sink at the start of each fixed-point
/// iteration, so only the final iteration's messages survive into the
/// emitted output.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    pub messages: Vec<Diagnostic>,
    num_errors: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        self.messages.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            node,
        });
        self.num_errors += 1;
    }

    pub fn warning(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        self.messages.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            node,
        });
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn has_errors(&self) -> bool {
        self.num_errors > 0
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops all accumulated messages and resets the error counter.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.num_errors = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_errors_not_warnings() {
        let mut diags = Diagnostics::new();
        diags.warning(None, "heads up");
        assert!(!diags.has_errors());
        diags.error(None, "broken");
        diags.error(None, "still broken");
        assert_eq!(diags.num_errors(), 2);
        assert_eq!(diags.messages.len(), 3);
    }

    #[test]
    fn clear_resets_everything() {
        let mut diags = Diagnostics::new();
        diags.error(None, "oops");
        diags.clear();
        assert!(diags.is_empty());
        assert!(!diags.has_errors());
    }
}
