//! Graceful shutdown of servers sharing a process.
//!
//! A [`Finisher`] keeps a list of servers. [`Finisher::wait`] blocks until a termination
//! signal (`SIGINT` or `SIGTERM` by default) arrives or [`Finisher::trigger`] is called,
//! then shuts the servers down one by one, in registration order, each bounded by its
//! own timeout:
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use finish::{Finisher, GracefulTask, with_name, with_timeout};
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> std::io::Result<()> {
//! let listener = TcpListener::bind("localhost:8080").await?;
//! let srv = Arc::new(GracefulTask::spawn(|token| async move {
//!     // accept connections on `listener` until `token` is cancelled
//!     token.cancelled().await;
//!     drop(listener);
//!     Ok::<_, std::io::Error>(())
//! }));
//!
//! let mut fin = Finisher::new();
//! fin.add_with(srv, vec![with_name("public server"), with_timeout(Duration::from_secs(30))]);
//! fin.wait().await;
//! # Ok(())
//! # }
//! ```
//!
//! Progress is reported through a [`Logger`]; the lines look like
//! `finish: shutting down public server ...` and `finish: public server closed`.

mod adapters;
mod config;
mod finisher;
pub mod log;
mod options;
mod server;
pub mod signal;

pub use adapters::GracefulTask;
pub use config::{ConfigError, FinishConfig, LoggerKind};
pub use finisher::{DEFAULT_TIMEOUT, Finisher, Trigger};
pub use log::{DefaultLogger, Logger, MemoryLogger, StdoutLogger, TracingLogger};
pub use options::{AddOption, Entry, OptionError, with_name, with_timeout};
#[cfg(feature = "test-support")]
pub use server::MockServer;
pub use server::{BoxError, Server, ShutdownError, ShutdownScope};
pub use signal::{DEFAULT_SIGNALS, Signal};
