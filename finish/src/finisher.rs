use std::io::{self, Write};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::Instrument;

use crate::config::{FinishConfig, LoggerKind};
use crate::log::{DefaultLogger, Logger, StdoutLogger, TracingLogger};
use crate::options::{AddOption, Entry, OptionError};
use crate::server::{Server, ShutdownError, ShutdownScope};
use crate::signal::{DEFAULT_SIGNALS, Signal, SignalListener};

/// Used if [`Finisher::set_timeout`] was not called.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

type Arbiter = Arc<OnceLock<Notify>>;

/// Graceful shutdown of servers.
///
/// Register servers with [`Finisher::add`], then call [`Finisher::wait`]. It blocks until
/// one of the configured signals arrives or [`Finisher::trigger`] is called, and then shuts
/// the servers down one after another, in registration order, each within its own timeout.
///
/// Timeout, signals and logger fall back to [`DEFAULT_TIMEOUT`], [`DEFAULT_SIGNALS`] and
/// [`DefaultLogger`] whenever they are read while unset, so they can be changed at any
/// point before `wait`.
#[derive(Default)]
pub struct Finisher {
    timeout: Option<Duration>,
    logger: Option<Arc<dyn Logger>>,
    signals: Option<Vec<Signal>>,
    entries: Vec<Entry>,
    manual: Arbiter,
}

impl Finisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a finisher from file-based settings.
    pub fn from_config(config: &FinishConfig) -> Self {
        let mut finisher = Self::new();
        finisher.set_timeout(Duration::from_secs(config.timeout_secs));
        finisher.set_signals(config.signals.clone());
        let logger: Arc<dyn Logger> = match config.logger {
            LoggerKind::Default => Arc::new(DefaultLogger),
            LoggerKind::Stdout => Arc::new(StdoutLogger),
            LoggerKind::Tracing => Arc::new(TracingLogger),
        };
        finisher.set_logger(logger);
        finisher
    }

    /// Maximum time each server gets to finish in-flight work once shutdown starts.
    ///
    /// Applies to servers added afterwards; [`with_timeout`](crate::with_timeout)
    /// overrides it per server. A zero duration resets it to [`DEFAULT_TIMEOUT`].
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = Some(logger);
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        match &self.logger {
            Some(logger) => Arc::clone(logger),
            None => Arc::new(DefaultLogger),
        }
    }

    /// Signals which start the shutdown.
    pub fn set_signals(&mut self, signals: Vec<Signal>) {
        self.signals = Some(signals);
    }

    pub fn signals(&self) -> &[Signal] {
        self.signals.as_deref().unwrap_or(DEFAULT_SIGNALS)
    }

    /// Registered servers in registration order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Adds a server for graceful shutdown.
    pub fn add<S>(&mut self, server: Arc<S>)
    where
        S: Server + 'static,
    {
        self.add_with(server, Vec::new());
    }

    /// Adds a server with options changing its name or timeout:
    ///
    /// ```no_run
    /// # use std::{sync::Arc, time::Duration};
    /// # use finish::{Finisher, with_name, with_timeout};
    /// # fn demo(srv: Arc<tokio_util::task::TaskTracker>) {
    /// let mut fin = Finisher::new();
    /// fin.add_with(srv, vec![with_name("internal server"), with_timeout(Duration::from_secs(5))]);
    /// # }
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if one of the options fails. A misconfigured server must not make it to
    /// the shutdown phase unnoticed.
    pub fn add_with<S>(&mut self, server: Arc<S>, opts: Vec<AddOption>)
    where
        S: Server + 'static,
    {
        if let Err(e) = self.try_add_with(server, opts) {
            panic!("finish: failed to add server: {e}");
        }
    }

    /// Like [`Finisher::add_with`], but hands the option error back instead of panicking.
    /// Nothing is registered on error.
    pub fn try_add_with<S>(&mut self, server: Arc<S>, opts: Vec<AddOption>) -> Result<(), OptionError>
    where
        S: Server + 'static,
    {
        let mut entry = Entry::new(server, self.timeout());
        for opt in opts {
            opt.apply(&mut entry)?;
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Handle which triggers the shutdown from another task while [`Finisher::wait`]
    /// holds the finisher.
    pub fn trigger_handle(&self) -> Trigger {
        Trigger {
            manual: Arc::clone(&self.manual),
        }
    }

    /// Triggers the shutdown manually. If nothing waits yet, the next [`Finisher::wait`]
    /// returns right away.
    pub fn trigger(&self) {
        self.trigger_handle().trigger();
    }

    /// Blocks until one of the shutdown signals is received or the shutdown is triggered,
    /// then closes all servers, each within its timeout.
    ///
    /// Failures are reported through the logger only; the caller is expected to exit
    /// once this returns.
    pub async fn wait(&mut self) {
        self.update_names();

        let mut listener = SignalListener::install(self.signals());
        let manual = manual_slot(&self.manual);

        let woken_by = tokio::select! {
            signal = listener.recv() => Some(signal),
            () = manual.notified() => None,
        };
        drop(listener);
        write_wake_newline(woken_by, &mut io::stdout().lock());

        let log = self.logger();
        log.info(format_args!("finish: shutdown signal received"));

        for entry in &self.entries {
            let span = tracing::info_span!("shutdown", server = %entry.name());
            shutdown_entry(entry, log.as_ref()).instrument(span).await;
        }
    }

    fn update_names(&mut self) {
        if let [entry] = self.entries.as_mut_slice()
            && entry.name().is_empty()
        {
            entry.set_name("server");
            return;
        }

        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.name().is_empty() {
                entry.set_name(format!("server #{}", i + 1));
            }
        }
    }
}

async fn shutdown_entry(entry: &Entry, log: &dyn Logger) {
    let name = entry.name();
    let scope = ShutdownScope::with_timeout(entry.timeout());

    log.info(format_args!("finish: shutting down {name} ..."));
    let result = entry.server().shutdown(&scope).await;
    drop(scope);

    match result {
        Ok(()) => log.info(format_args!("finish: {name} closed")),
        Err(ShutdownError::DeadlineExceeded) => {
            log.error(format_args!("finish: shutdown timeout for {name}"));
        }
        Err(e) => log.error(format_args!("finish: error while shutting down {name}: {e}")),
    }
}

/// Keeps log lines off the "^C" the terminal echoes for an interrupt. A closed stdout
/// must not stop the drain, so write errors are ignored.
fn write_wake_newline(woken_by: Option<Signal>, out: &mut impl Write) {
    if woken_by == Some(Signal::Interrupt) {
        let _ = writeln!(out);
    }
}

fn manual_slot(manual: &OnceLock<Notify>) -> &Notify {
    manual.get_or_init(Notify::new)
}

/// Cloneable handle triggering the shutdown of the [`Finisher`] it came from.
#[derive(Clone)]
pub struct Trigger {
    manual: Arbiter,
}

impl Trigger {
    /// Never blocks. Triggers beyond the first pending one are dropped.
    pub fn trigger(&self) {
        manual_slot(&self.manual).notify_one();
    }
}
