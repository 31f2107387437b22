//! Study room server.
//!
//! Run with:
//! ```not_rust
//! JWT_SECRET=changeme cargo run --bin studyroom-server
//! cargo run --bin studyroom-server -- --host 0.0.0.0 --port 3000 --jwt-secret changeme
//! ```

use std::sync::Arc;

use clap::Parser;
use studyroom_server::{
    config::ServerConfig,
    infrastructure::{
        identity::JwtIdentityProvider, repository::InMemoryRoomRepository,
        session_store::InMemorySessionStore,
    },
    ui::Server,
};
use studyroom_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(_))
    {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    // Initialize dependencies in order:
    // 1. Repository
    // 2. SessionStore / IdentityProvider
    // 3. Server (MessagePusher, UseCases)

    // 1. Create Repository (in-memory room registry)
    let retention = config.retention();
    let repository = Arc::new(InMemoryRoomRepository::new(retention));
    tracing::info!("Room retention: {:?}", retention);
    let _sweeper = repository.clone().spawn_sweeper(config.sweep_interval());

    // 2. Create external collaborators
    let session_store = Arc::new(InMemorySessionStore::new(config.auto_provision_rooms));
    let identity_provider = Arc::new(JwtIdentityProvider::from_secret(
        config.jwt_secret.as_bytes(),
    ));

    // 3. Create and run the server
    let server = Server::assemble(
        repository,
        session_store,
        identity_provider,
        Arc::new(SystemClock),
    );
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
