#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, kill};
use nix::unistd::Pid;

use finish::{Finisher, MemoryLogger, MockServer, Signal};

/// Sends `sig` to this test process once `wait` had time to install its handlers.
fn send_later(sig: signal::Signal) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        kill(Pid::this(), sig).unwrap();
    });
}

fn build_finisher(signals: Vec<Signal>) -> (Finisher, Arc<MemoryLogger>) {
    let mut srv = MockServer::new();
    srv.expect_shutdown().times(1).returning(|_| Ok(()));

    let log = Arc::new(MemoryLogger::new());
    let mut fin = Finisher::new();
    fin.set_logger(log.clone());
    fin.set_signals(signals);
    fin.add(Arc::new(srv));
    (fin, log)
}

#[tokio::test]
async fn interrupt_starts_shutdown() {
    let (mut fin, log) = build_finisher(vec![Signal::Interrupt]);

    send_later(signal::Signal::SIGINT);
    tokio::time::timeout(Duration::from_secs(10), fin.wait())
        .await
        .unwrap();

    assert_eq!(
        log.infos(),
        vec![
            "finish: shutdown signal received",
            "finish: shutting down server ...",
            "finish: server closed",
        ]
    );
    assert!(!log.has_errors());
}

#[tokio::test]
async fn custom_signal_starts_shutdown() {
    let (mut fin, log) = build_finisher(vec![Signal::User1]);

    send_later(signal::Signal::SIGUSR1);
    tokio::time::timeout(Duration::from_secs(10), fin.wait())
        .await
        .unwrap();

    assert_eq!(log.infos()[0], "finish: shutdown signal received");
    assert_eq!(log.infos().last().unwrap(), "finish: server closed");
}
