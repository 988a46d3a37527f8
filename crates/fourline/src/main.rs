use fourline::{GameServer, ServerError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr =
        std::env::var("FOURLINE_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
    let server = GameServer::builder().bind(&addr).build().await?;
    server.run().await
}
