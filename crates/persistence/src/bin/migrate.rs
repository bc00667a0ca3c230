#![deny(warnings)]

use persistence::default_sqlite_url;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let url = std::env::var("QUESTS_DATABASE_URL").unwrap_or_else(|_| default_sqlite_url().to_string());
    let pool = persistence::init_db(&url).await?;
    let rules: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recurring_rules")
        .fetch_one(&pool)
        .await?;
    println!("DB migrated at {} ({} rules)", url, rules);
    Ok(())
}
