// nuoke chat server binary

use anyhow::Context;
use clap::Parser;
use nuoke::chat::{run_console, ChatConfig, ChatServer, ChatState, ServerCli, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nuoke=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = ServerCli::parse();

    // Overrides apply to the running server only; /setname saves file_config
    let file_config = ChatConfig::load_or_default(&cli.config)?;
    let mut config = file_config.clone();
    cli.apply_overrides(&mut config);
    config.validate()?;

    let store = Store::open(&cli.data_dir).context("Failed to open data directory")?;
    let addr = cli.listen_addr(&config);
    tracing::info!("群聊名称: {}", config.chat.group_name);

    let state = ChatState::new(config, store).with_config_file(cli.config.clone(), file_config);
    let server = ChatServer::start(&addr, state).await?;

    if !cli.no_console {
        tokio::spawn(run_console(server.handle()));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");

    server.shutdown().await?;
    Ok(())
}
