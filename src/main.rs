use std::sync::Arc;

use futures::StreamExt;

use support_relay::config::Config;
use support_relay::relay::RelayRouter;
use support_relay::store::{IdentityStore, LibSqlStore};
use support_relay::telegram::{BotApi, Telegram, spawn_update_stream};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("🛟 Support Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Support group: {}", config.support_group_id);
    eprintln!("   Database: {}", config.db_path);

    let store = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path)).await?,
    );

    let api = Arc::new(BotApi::new(config.bot_token.clone()));

    // Verify the token before going into the poll loop
    let me = api.get_me().await?;
    eprintln!("   Bot: @{}\n", me.username.as_deref().unwrap_or("unknown"));

    let router = Arc::new(RelayRouter::new(
        Arc::clone(&store) as Arc<dyn IdentityStore>,
        Arc::clone(&api) as Arc<dyn Telegram>,
        config.support_group_id,
    ));

    let updates = spawn_update_stream(api);
    let mut updates = std::pin::pin!(updates);

    loop {
        tokio::select! {
            maybe_message = updates.next() => {
                let Some(message) = maybe_message else { break };
                let router = Arc::clone(&router);
                // Each update is handled on its own task; ordering between
                // users is irrelevant and the store arbitrates races.
                tokio::spawn(async move { router.handle(message).await });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
