use std::{env, sync::Arc, time::Duration};

use demo_server::{PublicState, internal_router, public_router, serve, telemetry};
use finish::{FinishConfig, Finisher, with_name, with_timeout};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    let telemetry = Arc::new(telemetry::init_telemetry("demo-server"));

    let config_path = env::var("FINISH_CONFIG_PATH").unwrap_or_else(|_| "finish.toml".to_string());
    let config = FinishConfig::load(&config_path).expect("Failed to load finish config");
    let public_port = env::var("PUBLIC_PORT").unwrap_or_else(|_| "8080".to_string());
    let internal_port = env::var("INTERNAL_PORT").unwrap_or_else(|_| "3000".to_string());

    let public_listener = TcpListener::bind(format!("0.0.0.0:{public_port}"))
        .await
        .expect("Failed to bind public server");
    let internal_listener = TcpListener::bind(format!("127.0.0.1:{internal_port}"))
        .await
        .expect("Failed to bind internal server");

    tracing::info!("public server listening on 0.0.0.0:{public_port}");
    let public = serve(public_listener, public_router(Arc::new(PublicState::default())));
    tracing::info!("internal server listening on 127.0.0.1:{internal_port}");
    let internal = serve(internal_listener, internal_router());

    let mut fin = Finisher::from_config(&config);
    fin.add_with(Arc::new(public), vec![with_name("public server")]);
    fin.add_with(
        Arc::new(internal),
        vec![
            with_name("internal server"),
            with_timeout(Duration::from_secs(5)),
        ],
    );
    fin.add_with(telemetry, vec![with_name("telemetry")]);

    fin.wait().await;
}
