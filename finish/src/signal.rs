//! Operating system signals that start the shutdown.

use std::fmt;
use std::future::Future;
use std::io;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinSet;

/// A termination signal a [`Finisher`](crate::Finisher) can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Signal {
    /// `SIGINT`, sent by pressing Control-C.
    Interrupt,
    /// `SIGTERM`, sent by `kill <pid>` or a service manager stopping the process.
    Terminate,
    Hangup,
    Quit,
    User1,
    User2,
}

/// Used when no signals are configured: `SIGINT` and `SIGTERM`.
pub const DEFAULT_SIGNALS: &[Signal] = &[Signal::Interrupt, Signal::Terminate];

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
            Self::Quit => "SIGQUIT",
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Self::Interrupt => SignalKind::interrupt(),
            Self::Terminate => SignalKind::terminate(),
            Self::Hangup => SignalKind::hangup(),
            Self::Quit => SignalKind::quit(),
            Self::User1 => SignalKind::user_defined1(),
            Self::User2 => SignalKind::user_defined2(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown signal: {0}")]
pub struct UnknownSignal(String);

impl FromStr for Signal {
    type Err = UnknownSignal;

    /// Accepts `interrupt`, `int` and `SIGINT` style names, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("sig").unwrap_or(&lower);
        match name {
            "interrupt" | "int" => Ok(Self::Interrupt),
            "terminate" | "term" => Ok(Self::Terminate),
            "hangup" | "hup" => Ok(Self::Hangup),
            "quit" => Ok(Self::Quit),
            "user1" | "usr1" => Ok(Self::User1),
            "user2" | "usr2" => Ok(Self::User2),
            _ => Err(UnknownSignal(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Signal {
    type Error = UnknownSignal;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(unix)]
fn listen(signal: Signal) -> io::Result<impl Future<Output = Option<Signal>> + Send + 'static> {
    let mut stream = tokio::signal::unix::signal(signal.kind())?;
    Ok(async move { stream.recv().await.map(|()| signal) })
}

#[cfg(not(unix))]
fn listen(signal: Signal) -> io::Result<impl Future<Output = Option<Signal>> + Send + 'static> {
    if signal != Signal::Interrupt {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{signal} is not supported on this platform"),
        ));
    }
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    Ok(async move { ctrl_c.recv().await.map(|()| signal) })
}

/// Intercepts a set of signals and yields whichever arrives first.
///
/// Dropping the listener stops observing the signals. Tokio keeps the process-level
/// handlers installed, so a later delivery is swallowed instead of killing the process.
pub(crate) struct SignalListener {
    tasks: JoinSet<Option<Signal>>,
}

impl SignalListener {
    pub(crate) fn install(signals: &[Signal]) -> Self {
        let mut tasks = JoinSet::new();
        for &signal in signals {
            match listen(signal) {
                Ok(next) => {
                    tasks.spawn(next);
                }
                Err(e) => {
                    tracing::warn!(%signal, error = %e, "Failed to install signal handler, ignoring it");
                }
            }
        }
        Self { tasks }
    }

    /// Waits for the first intercepted signal. Never completes if nothing could be
    /// installed.
    pub(crate) async fn recv(&mut self) -> Signal {
        while let Some(joined) = self.tasks.join_next().await {
            if let Ok(Some(signal)) = joined {
                tracing::debug!(%signal, "Intercepted signal");
                return signal;
            }
        }
        std::future::pending().await
    }
}
