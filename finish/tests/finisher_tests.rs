use std::sync::Arc;
use std::time::Duration;

use mockall::Sequence;

use finish::{
    Finisher, MemoryLogger, MockServer, ShutdownError, with_name, with_timeout,
};

fn build_finisher() -> (Finisher, Arc<MemoryLogger>) {
    let log = Arc::new(MemoryLogger::new());
    let mut fin = Finisher::new();
    fin.set_logger(log.clone());
    fin.set_signals(Vec::new());
    (fin, log)
}

#[tokio::test]
async fn mocked_servers_shut_down_in_registration_order() {
    let mut seq = Sequence::new();
    let mut servers = Vec::new();
    for _ in 0..3 {
        let mut srv = MockServer::new();
        srv.expect_shutdown()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        servers.push(Arc::new(srv));
    }

    let (mut fin, log) = build_finisher();
    for srv in servers {
        fin.add(srv);
    }

    fin.trigger();
    fin.wait().await;

    assert_eq!(
        log.infos(),
        vec![
            "finish: shutdown signal received",
            "finish: shutting down server #1 ...",
            "finish: server #1 closed",
            "finish: shutting down server #2 ...",
            "finish: server #2 closed",
            "finish: shutting down server #3 ...",
            "finish: server #3 closed",
        ]
    );
}

#[tokio::test]
async fn second_unnamed_server_gets_numbered_name() {
    let mut public = MockServer::new();
    public.expect_shutdown().times(1).returning(|_| Ok(()));
    let mut internal = MockServer::new();
    internal
        .expect_shutdown()
        .times(1)
        .returning(|_| Err(ShutdownError::DeadlineExceeded));

    let (mut fin, log) = build_finisher();
    fin.add_with(Arc::new(public), vec![with_name("public")]);
    fin.add(Arc::new(internal));

    fin.trigger();
    fin.wait().await;

    let names: Vec<_> = fin.entries().iter().map(|e| e.name().to_owned()).collect();
    assert_eq!(names, vec!["public", "server #2"]);
    assert_eq!(log.errors(), vec!["finish: shutdown timeout for server #2"]);
}

#[tokio::test]
async fn scope_carries_entry_timeout() {
    let mut srv = MockServer::new();
    srv.expect_shutdown()
        .withf(|scope| {
            let remaining = scope.remaining();
            remaining > Duration::from_secs(4) && remaining <= Duration::from_secs(5)
        })
        .times(1)
        .returning(|_| Ok(()));

    let (mut fin, log) = build_finisher();
    fin.add_with(Arc::new(srv), vec![with_timeout(Duration::from_secs(5))]);

    fin.trigger();
    fin.wait().await;

    assert!(!log.has_errors());
}

#[tokio::test]
async fn server_error_description_is_kept() {
    let mut srv = MockServer::new();
    srv.expect_shutdown()
        .times(1)
        .returning(|_| Err(ShutdownError::other("connection pool still in use")));

    let (mut fin, log) = build_finisher();
    fin.add_with(Arc::new(srv), vec![with_name("db")]);

    fin.trigger();
    fin.wait().await;

    assert_eq!(
        log.errors(),
        vec!["finish: error while shutting down db: connection pool still in use"]
    );
}

#[tokio::test]
async fn trigger_from_another_task_wakes_wait() {
    let mut srv = MockServer::new();
    srv.expect_shutdown().times(1).returning(|_| Ok(()));

    let (mut fin, log) = build_finisher();
    fin.add(Arc::new(srv));

    let trigger = fin.trigger_handle();
    let waiter = tokio::spawn(async move {
        fin.wait().await;
        fin
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    trigger.trigger();
    let fin = waiter.await.unwrap();

    assert_eq!(fin.entries()[0].name(), "server");
    assert_eq!(log.infos().last().unwrap(), "finish: server closed");
}
