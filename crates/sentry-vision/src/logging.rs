//! Component logging capability.
//!
//! Each component receives a [`ComponentLogger`] at construction instead of
//! reaching for a process-wide logger, so every event carries the name of
//! the component that emitted it.

use tracing::{debug, error, info, warn, Span};

/// Logger handed to a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentLogger {
    component: &'static str,
}

impl ComponentLogger {
    /// Create a logger for the named component (e.g. "tracker", "sentry").
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    /// Get the component name.
    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn debug(&self, message: &str) {
        debug!(component = self.component, "{}", message);
    }

    pub fn info(&self, message: &str) {
        info!(component = self.component, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(component = self.component, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(component = self.component, "{}", message);
    }

    /// Create a tracing span for this component.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("component", component = self.component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_logger_creation() {
        let logger = ComponentLogger::new("tracker");
        assert_eq!(logger.component(), "tracker");
        // Emitting without a subscriber must be harmless.
        logger.info("started");
        let _span = logger.create_span();
    }
}
