use bucketgate_core::GatewayConfig;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize the application (database, clients, routes)
    let (_state, router) = bucketgate_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    bucketgate_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
