use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cashout::bot::{callback_handler, message_handler, DialogueManager};
use cashout::config::BotConfig;
use cashout::db::{init_database_schema, PgTransactionRepository, PgUserRepository};
use cashout::extraction::LlmExtractor;
use cashout::localization::init_localization;
use cashout::repository::{
    InMemTransactionRepository, InMemUserRepository, TransactionRepository, UserRepository,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    info!("Starting Cashout Telegram Bot");

    let config = BotConfig::from_env()?;

    init_localization()?;

    let (users, transactions): (Arc<dyn UserRepository>, Arc<dyn TransactionRepository>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database");
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await
                    .context("Failed to connect to database")?;

                init_database_schema(&pool).await?;

                (
                    Arc::new(PgUserRepository::new(pool.clone())),
                    Arc::new(PgTransactionRepository::new(pool)),
                )
            }
            None => {
                warn!("DATABASE_URL not set, sessions and transactions are kept in memory");
                (
                    Arc::new(InMemUserRepository::new()),
                    Arc::new(InMemTransactionRepository::new()),
                )
            }
        };

    let extractor = Arc::new(LlmExtractor::new(config.extraction.clone()));
    let manager = Arc::new(DialogueManager::new(
        users,
        transactions,
        extractor,
        config.access.clone(),
    ));

    let bot = Bot::new(config.bot_token);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![manager])
        // Every update runs on its own; sessions are last-writer-wins
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
