//! Diagnostic taps.
//!
//! The invoker reports every stage transition to a [`DiagnosticSource`].
//! Listeners are asked whether they care about an event before it is built,
//! and a panicking listener is contained so diagnostics can never break a
//! request.
//!
//! ```
//! use armature_mvc_core::diagnostics::{events, DiagnosticEvent, DiagnosticListener, DiagnosticSource};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl DiagnosticListener for Printer {
//!     fn on_event(&self, event: &DiagnosticEvent<'_>) {
//!         println!("{} {}", event.name, event.action);
//!     }
//! }
//!
//! let source = DiagnosticSource::new().with_listener(Arc::new(Printer));
//! assert!(source.is_enabled(events::BEFORE_ACTION));
//! ```

use crate::logging::pipeline;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Event names, one per pipeline transition.
pub mod events {
    pub const BEFORE_ACTION: &str = "Armature.Mvc.BeforeAction";
    pub const AFTER_ACTION: &str = "Armature.Mvc.AfterAction";

    pub const BEFORE_ON_AUTHORIZATION: &str = "Armature.Mvc.BeforeOnAuthorization";
    pub const AFTER_ON_AUTHORIZATION: &str = "Armature.Mvc.AfterOnAuthorization";

    pub const BEFORE_ON_RESOURCE_EXECUTING: &str = "Armature.Mvc.BeforeOnResourceExecuting";
    pub const AFTER_ON_RESOURCE_EXECUTING: &str = "Armature.Mvc.AfterOnResourceExecuting";
    pub const BEFORE_ON_RESOURCE_EXECUTED: &str = "Armature.Mvc.BeforeOnResourceExecuted";
    pub const AFTER_ON_RESOURCE_EXECUTED: &str = "Armature.Mvc.AfterOnResourceExecuted";
    pub const BEFORE_ON_RESOURCE_EXECUTION: &str = "Armature.Mvc.BeforeOnResourceExecution";
    pub const AFTER_ON_RESOURCE_EXECUTION: &str = "Armature.Mvc.AfterOnResourceExecution";

    pub const BEFORE_ON_ACTION_EXECUTING: &str = "Armature.Mvc.BeforeOnActionExecuting";
    pub const AFTER_ON_ACTION_EXECUTING: &str = "Armature.Mvc.AfterOnActionExecuting";
    pub const BEFORE_ON_ACTION_EXECUTED: &str = "Armature.Mvc.BeforeOnActionExecuted";
    pub const AFTER_ON_ACTION_EXECUTED: &str = "Armature.Mvc.AfterOnActionExecuted";
    pub const BEFORE_ON_ACTION_EXECUTION: &str = "Armature.Mvc.BeforeOnActionExecution";
    pub const AFTER_ON_ACTION_EXECUTION: &str = "Armature.Mvc.AfterOnActionExecution";

    pub const BEFORE_ACTION_METHOD: &str = "Armature.Mvc.BeforeActionMethod";
    pub const AFTER_ACTION_METHOD: &str = "Armature.Mvc.AfterActionMethod";

    pub const BEFORE_ON_EXCEPTION: &str = "Armature.Mvc.BeforeOnException";
    pub const AFTER_ON_EXCEPTION: &str = "Armature.Mvc.AfterOnException";

    pub const BEFORE_ON_RESULT_EXECUTING: &str = "Armature.Mvc.BeforeOnResultExecuting";
    pub const AFTER_ON_RESULT_EXECUTING: &str = "Armature.Mvc.AfterOnResultExecuting";
    pub const BEFORE_ON_RESULT_EXECUTED: &str = "Armature.Mvc.BeforeOnResultExecuted";
    pub const AFTER_ON_RESULT_EXECUTED: &str = "Armature.Mvc.AfterOnResultExecuted";
    pub const BEFORE_ON_RESULT_EXECUTION: &str = "Armature.Mvc.BeforeOnResultExecution";
    pub const AFTER_ON_RESULT_EXECUTION: &str = "Armature.Mvc.AfterOnResultExecution";

    pub const BEFORE_ACTION_RESULT: &str = "Armature.Mvc.BeforeActionResult";
    pub const AFTER_ACTION_RESULT: &str = "Armature.Mvc.AfterActionResult";
}

/// Payload delivered to listeners.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent<'a> {
    pub name: &'static str,
    /// Display name of the action being dispatched
    pub action: &'a str,
    pub trace_identifier: &'a str,
    /// Filter or result type involved, when the event is about one
    pub subject: Option<&'a str>,
}

/// Observer of pipeline transitions.
pub trait DiagnosticListener: Send + Sync {
    /// Cheap pre-check; events a listener does not want are never built.
    fn is_enabled(&self, _name: &str) -> bool {
        true
    }

    fn on_event(&self, event: &DiagnosticEvent<'_>);
}

/// Fans events out to registered listeners.
#[derive(Clone, Default)]
pub struct DiagnosticSource {
    listeners: Vec<Arc<dyn DiagnosticListener>>,
}

impl DiagnosticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn DiagnosticListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn DiagnosticListener>) {
        self.listeners.push(listener);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.listeners.iter().any(|l| listener_enabled(&**l, name))
    }

    /// Deliver an event built lazily by `build`.
    ///
    /// A listener that panics, in either hook, is logged and skipped.
    pub fn write<'a>(&self, name: &'static str, build: impl FnOnce() -> DiagnosticEvent<'a>) {
        let enabled: Vec<&Arc<dyn DiagnosticListener>> = self
            .listeners
            .iter()
            .filter(|&l| listener_enabled(&**l, name))
            .collect();
        if enabled.is_empty() {
            return;
        }

        let event = build();
        for listener in enabled {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
            if delivered.is_err() {
                pipeline::diagnostic_listener_panicked(name);
            }
        }
    }
}

fn listener_enabled(listener: &dyn DiagnosticListener, name: &str) -> bool {
    catch_unwind(AssertUnwindSafe(|| listener.is_enabled(name))).unwrap_or_else(|_| {
        pipeline::diagnostic_listener_panicked(name);
        false
    })
}

impl fmt::Debug for DiagnosticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSource")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<String>>,
    }

    impl DiagnosticListener for Collect {
        fn is_enabled(&self, name: &str) -> bool {
            name != events::AFTER_ACTION
        }

        fn on_event(&self, event: &DiagnosticEvent<'_>) {
            self.seen.lock().push(event.name.to_string());
        }
    }

    struct Explode;

    impl DiagnosticListener for Explode {
        fn on_event(&self, _event: &DiagnosticEvent<'_>) {
            panic!("listener failure");
        }
    }

    fn event(name: &'static str) -> DiagnosticEvent<'static> {
        DiagnosticEvent {
            name,
            action: "orders.details",
            trace_identifier: "t-1",
            subject: None,
        }
    }

    #[test]
    fn test_disabled_events_are_never_built() {
        let source = DiagnosticSource::new();
        let mut built = false;
        source.write(events::BEFORE_ACTION, || {
            built = true;
            event(events::BEFORE_ACTION)
        });
        assert!(!built);
    }

    #[test]
    fn test_listener_filtering() {
        let collect = Arc::new(Collect::default());
        let source = DiagnosticSource::new().with_listener(collect.clone());

        source.write(events::BEFORE_ACTION, || event(events::BEFORE_ACTION));
        source.write(events::AFTER_ACTION, || event(events::AFTER_ACTION));

        assert_eq!(*collect.seen.lock(), vec![events::BEFORE_ACTION.to_string()]);
    }

    #[test]
    fn test_panicking_is_enabled_is_contained() {
        struct Picky;

        impl DiagnosticListener for Picky {
            fn is_enabled(&self, _name: &str) -> bool {
                panic!("filter failure");
            }

            fn on_event(&self, _event: &DiagnosticEvent<'_>) {}
        }

        let collect = Arc::new(Collect::default());
        let source = DiagnosticSource::new()
            .with_listener(Arc::new(Picky))
            .with_listener(collect.clone());

        assert!(source.is_enabled(events::BEFORE_ACTION));
        source.write(events::BEFORE_ACTION, || event(events::BEFORE_ACTION));
        assert_eq!(*collect.seen.lock(), vec![events::BEFORE_ACTION.to_string()]);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let collect = Arc::new(Collect::default());
        let source = DiagnosticSource::new()
            .with_listener(Arc::new(Explode))
            .with_listener(collect.clone());

        source.write(events::BEFORE_ACTION_METHOD, || {
            event(events::BEFORE_ACTION_METHOD)
        });

        assert_eq!(collect.seen.lock().len(), 1);
    }
}
