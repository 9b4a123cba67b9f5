use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use deposit_settler::{ Config, JobFamily };
use deposit_settler::crypto::{ CredentialVault, Encryptor };
use deposit_settler::db::{ BalanceRepository, CredentialRepository, LedgerRepository };
use deposit_settler::exchange::{ CoincheckClient, ExchangeApi };
use deposit_settler::jobs::{ job_queue, JobProcessor, JobWorker };
use deposit_settler::reconfig::SettingsListener;
use deposit_settler::scheduler::Scheduler;
use deposit_settler::services::{ BalanceSyncService, SettingsService, SettlementService };
use migration::MigratorTrait;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "deposit_settler=debug,tower_http=info".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!(exchange = %config.exchange_base_url, "Starting deposit-settler");

    // Initialize database connection
    let db = sea_orm::Database::connect(&config.database_url).await?;

    tracing::info!("Database connected successfully");

    // Run migrations
    migration::Migrator::up(&db, None).await?;

    tracing::info!("Migrations completed successfully");

    // Initialize encryptor and exchange client
    let encryptor = Arc::new(Encryptor::new(&config.encryption_key)?);
    let vault = Arc::new(CredentialVault::new(encryptor));
    let exchange: Arc<dyn ExchangeApi> = Arc::new(CoincheckClient::new(&config.exchange_base_url)?);

    // Initialize repositories
    let credentials = Arc::new(CredentialRepository::new(db.clone()));
    let ledger = Arc::new(LedgerRepository);
    let balances = Arc::new(BalanceRepository);

    // Initialize services
    let settings = Arc::new(SettingsService::new(db.clone(), config.settings_owner.clone()));

    let settlement = Arc::new(
        SettlementService::new(
            db.clone(),
            credentials.clone(),
            ledger,
            vault.clone(),
            exchange.clone(),
            config.fiat_currency.clone(),
            config.max_concurrent_credentials
        )
    );

    let balance_sync = Arc::new(
        BalanceSyncService::new(
            db.clone(),
            credentials,
            balances,
            vault,
            exchange,
            config.max_concurrent_credentials
        )
    );

    let processor = Arc::new(JobProcessor::new(settings.clone(), settlement, balance_sync));

    // Start one worker per job family
    let backoff_base = Duration::from_millis(config.job_backoff_base_ms);
    let (deposit_queue, deposit_jobs) = job_queue(JobFamily::DepositCheck, config.job_queue_capacity);
    let (balance_queue, balance_jobs) = job_queue(JobFamily::BalanceSync, config.job_queue_capacity);

    tokio::spawn(
        JobWorker::new(JobFamily::DepositCheck, deposit_jobs, processor.clone(), backoff_base).run()
    );
    tokio::spawn(JobWorker::new(JobFamily::BalanceSync, balance_jobs, processor, backoff_base).run());

    // Install recurring jobs and follow settings changes
    let scheduler = Arc::new(Scheduler::new(settings, deposit_queue, balance_queue));
    scheduler.rebuild().await;

    let listener = SettingsListener::new(
        &config.redis_url,
        config.settings_channel.clone(),
        scheduler.clone()
    )?;
    tokio::spawn(listener.run());

    // Build application router
    let app = deposit_settler::api::router(deposit_settler::api::AppState::new(scheduler.clone()));

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Server listening on {}", addr);

    let tcp = tokio::net::TcpListener
        ::bind(&addr).await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(tcp, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        }).await
        .context("server error")?;

    scheduler.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
