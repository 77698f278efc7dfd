use taskrelay_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Provision the queue, start the listener and build the routes
    let app = taskrelay_api::initialize_app(config.clone()).await?;

    // Start the server
    taskrelay_api::setup::server::start_server(&config, app).await?;

    Ok(())
}
