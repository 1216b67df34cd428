use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::server::Server;

/// A server registered with a [`Finisher`](crate::Finisher), together with its display
/// name and shutdown timeout.
pub struct Entry {
    server: Arc<dyn Server>,
    name: String,
    timeout: Duration,
}

impl Entry {
    pub(crate) fn new(server: Arc<dyn Server>, timeout: Duration) -> Self {
        Self {
            server,
            name: String::new(),
            timeout,
        }
    }

    /// Display name used in log lines. Empty until a name is set or defaulted by
    /// [`Finisher::wait`](crate::Finisher::wait).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn server(&self) -> &Arc<dyn Server> {
        &self.server
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Error returned by an [`AddOption`] that rejects the pending registration.
#[derive(Debug, Error)]
pub enum OptionError {
    #[error("shutdown timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid option: {0}")]
    Invalid(String),
}

type ApplyFn = Box<dyn FnOnce(&mut Entry) -> Result<(), OptionError> + Send>;

/// Changes the behavior for one server registered via
/// [`Finisher::add_with`](crate::Finisher::add_with).
///
/// Options run in the order they are passed, so a later option wins over an earlier one
/// touching the same field.
pub struct AddOption(ApplyFn);

impl AddOption {
    /// Builds a custom option from a function mutating the pending entry.
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Entry) -> Result<(), OptionError> + Send + 'static,
    {
        Self(Box::new(apply))
    }

    pub(crate) fn apply(self, entry: &mut Entry) -> Result<(), OptionError> {
        (self.0)(entry)
    }
}

impl fmt::Debug for AddOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AddOption")
    }
}

/// Overrides the finisher-wide timeout for this server.
pub fn with_timeout(timeout: Duration) -> AddOption {
    AddOption::new(move |entry| {
        if timeout.is_zero() {
            return Err(OptionError::ZeroTimeout);
        }
        entry.set_timeout(timeout);
        Ok(())
    })
}

/// Sets a custom name for this server.
///
/// Without it the name defaults to `server` when only one server is registered, and to
/// `server #<num>` otherwise.
pub fn with_name(name: impl Into<String>) -> AddOption {
    let name = name.into();
    AddOption::new(move |entry| {
        entry.set_name(name);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{ShutdownError, ShutdownScope};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Server for Noop {
        async fn shutdown(&self, _scope: &ShutdownScope) -> Result<(), ShutdownError> {
            Ok(())
        }
    }

    fn make_entry() -> Entry {
        Entry::new(Arc::new(Noop), Duration::from_secs(10))
    }

    #[test]
    fn later_option_wins() {
        let mut entry = make_entry();
        for opt in [
            with_name("first"),
            with_timeout(Duration::from_secs(3)),
            with_name("second"),
        ] {
            opt.apply(&mut entry).unwrap();
        }

        assert_eq!(entry.name(), "second");
        assert_eq!(entry.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut entry = make_entry();
        let err = with_timeout(Duration::ZERO).apply(&mut entry).unwrap_err();

        assert!(matches!(err, OptionError::ZeroTimeout));
        assert_eq!(entry.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn debug_skips_server() {
        let mut entry = make_entry();
        entry.set_name("public");
        let debug = format!("{entry:?}");

        assert!(debug.contains("public"));
        assert!(!debug.contains("server:"));
    }
}
