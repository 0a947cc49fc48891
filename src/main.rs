use anyhow::Context;
use futures_util::future::join_all;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ledger_es::config::{Config, EventStoreBackend, ReadModelBackend, SnapshotBackend};
use ledger_es::domain::account::{
    account_projection_registry, AccountCommand, AccountCommandHandler, AccountQueryService,
    AccountReadModel, AccountRehydrator, InMemoryAccountReadModel, PostgresAccountReadModel,
};
use ledger_es::domain::user::{
    user_projection_registry, InMemoryUserReadModel, PostgresUserReadModel, User, UserCommand,
    UserCommandHandler, UserQueryService, UserReadModel, UserRehydrator,
};
use ledger_es::event_sourcing::snapshot::{RedisSnapshotRepository, ScyllaSnapshotRepository};
use ledger_es::event_sourcing::store::{PostgresEventStore, ScyllaEventStore};
use ledger_es::event_sourcing::{
    AggregateRoot, EventSourcedRepository, EventStore, InMemoryEventStore, InMemorySnapshotRepository,
    Rehydrator, SnapshotRepository,
};
use ledger_es::metrics::{self, RepositoryMetrics};

type AccountRepository = EventSourcedRepository<AccountRehydrator>;
type UserRepository = EventSourcedRepository<UserRehydrator>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ledger_es=debug")),
        )
        .init();

    tracing::info!("🚀 Starting event-sourced ledger");

    let config = Config::from_env()?;

    // === 1. Prometheus metrics ===
    let metrics = Arc::new(RepositoryMetrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 2. Backend clients, built once and injected ===
    let scylla = if config.needs_scylla() {
        Some(connect_scylla(&config).await?)
    } else {
        None
    };

    let postgres = if config.needs_postgres() {
        tracing::info!("Connecting to Postgres...");
        Some(
            PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.database_url)
                .await
                .context("Failed to connect to Postgres")?,
        )
    } else {
        None
    };

    let event_store = build_event_store(&config, scylla.as_ref(), postgres.as_ref()).await?;
    let (account_views, user_views) = build_read_models(&config, postgres.as_ref()).await?;

    // === 3. Repositories: one log, one repository per aggregate type ===
    let accounts: AccountRepository =
        build_repository(&config, event_store.clone(), scylla.as_ref(), metrics.clone()).await?;
    let accounts = {
        let projections = Arc::new(account_projection_registry(accounts.clone(), account_views.clone()));
        tracing::info!(event_types = ?projections.registered_event_types(), "Account projections registered");
        accounts.with_projections(projections)
    };

    let users: UserRepository =
        build_repository(&config, event_store, scylla.as_ref(), metrics.clone()).await?;
    let users = {
        let projections = Arc::new(user_projection_registry(users.clone(), user_views.clone()));
        tracing::info!(event_types = ?projections.registered_event_types(), "User projections registered");
        users.with_projections(projections)
    };

    // === 4. Demo ===
    run_account_demo(accounts, &AccountQueryService::new(account_views)).await?;
    run_user_demo(users, &UserQueryService::new(user_views)).await?;

    tracing::info!(
        "📊 Metrics registry holds {} metric families",
        metrics.registry().gather().len()
    );
    tracing::info!("🎉 Demo complete!");

    Ok(())
}

async fn connect_scylla(config: &Config) -> anyhow::Result<Arc<Session>> {
    tracing::info!(node = %config.scylla_node, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_node(&config.scylla_node)
        .build()
        .await
        .context("Failed to connect to ScyllaDB")?;

    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                config.scylla_keyspace
            ),
            &[],
        )
        .await?;
    session.use_keyspace(&config.scylla_keyspace, false).await?;

    Ok(Arc::new(session))
}

async fn build_event_store(
    config: &Config,
    scylla: Option<&Arc<Session>>,
    postgres: Option<&PgPool>,
) -> anyhow::Result<Arc<dyn EventStore>> {
    let store: Arc<dyn EventStore> = match config.event_store {
        EventStoreBackend::Memory => Arc::new(InMemoryEventStore::new()),
        EventStoreBackend::Scylla => {
            let session = scylla.context("ScyllaDB session not initialised")?;
            let store = ScyllaEventStore::new(session.clone());
            store.create_schema().await?;
            Arc::new(store)
        }
        EventStoreBackend::Postgres => {
            let pool = postgres.context("Postgres pool not initialised")?;
            let store = PostgresEventStore::new(pool.clone());
            store.create_schema().await?;
            Arc::new(store)
        }
    };

    tracing::info!(backend = ?config.event_store, "Event store ready");
    Ok(store)
}

async fn build_repository<R: Rehydrator>(
    config: &Config,
    event_store: Arc<dyn EventStore>,
    scylla: Option<&Arc<Session>>,
    metrics: Arc<RepositoryMetrics>,
) -> anyhow::Result<EventSourcedRepository<R>>
where
    R::Snapshot: 'static,
{
    let repository = EventSourcedRepository::<R>::new(event_store)
        .with_snapshot_interval(config.snapshot_interval)
        .with_metrics(metrics);

    Ok(match build_snapshots::<R>(config, scylla).await? {
        Some(snapshots) => repository.with_snapshots(snapshots),
        None => repository,
    })
}

async fn build_snapshots<R: Rehydrator>(
    config: &Config,
    scylla: Option<&Arc<Session>>,
) -> anyhow::Result<Option<Arc<dyn SnapshotRepository<R::Snapshot>>>>
where
    R::Snapshot: 'static,
{
    let aggregate_type = <R::Aggregate as AggregateRoot>::AGGREGATE_TYPE;

    let snapshots: Arc<dyn SnapshotRepository<R::Snapshot>> = match config.snapshots {
        SnapshotBackend::None => return Ok(None),
        SnapshotBackend::Memory => Arc::new(InMemorySnapshotRepository::new()),
        SnapshotBackend::Redis => {
            let client = redis::Client::open(config.redis_url.as_str())
                .context("Invalid REDIS_URL")?;
            let connection = client
                .get_multiplexed_async_connection()
                .await
                .context("Failed to connect to Redis")?;
            Arc::new(RedisSnapshotRepository::new(connection, aggregate_type))
        }
        SnapshotBackend::Scylla => {
            let session = scylla.context("ScyllaDB session not initialised")?;
            let repository = ScyllaSnapshotRepository::new(session.clone(), aggregate_type);
            repository.create_schema().await?;
            Arc::new(repository)
        }
    };

    tracing::info!(
        aggregate_type,
        backend = ?config.snapshots,
        interval = config.snapshot_interval,
        "Snapshots enabled"
    );
    Ok(Some(snapshots))
}

async fn build_read_models(
    config: &Config,
    postgres: Option<&PgPool>,
) -> anyhow::Result<(Arc<dyn AccountReadModel>, Arc<dyn UserReadModel>)> {
    match config.read_model {
        ReadModelBackend::Memory => Ok((
            Arc::new(InMemoryAccountReadModel::new()),
            Arc::new(InMemoryUserReadModel::new()),
        )),
        ReadModelBackend::Postgres => {
            let pool = postgres.context("Postgres pool not initialised")?;

            let accounts = PostgresAccountReadModel::new(pool.clone());
            accounts.create_schema().await?;
            let users = PostgresUserReadModel::new(pool.clone());
            users.create_schema().await?;

            Ok((Arc::new(accounts), Arc::new(users)))
        }
    }
}

async fn run_account_demo(repository: AccountRepository, queries: &AccountQueryService) -> anyhow::Result<()> {
    let handler = AccountCommandHandler::new(repository.clone());

    // Lifecycle through the command handler
    let account = handler.open_account(1_000).await?;
    let id = account.id();
    tracing::info!(account_id = %id, "✅ Account opened");

    handler.handle(id, AccountCommand::Deposit { amount: 500 }).await?;
    let account = handler.handle(id, AccountCommand::Withdraw { amount: 200 }).await?;
    tracing::info!(balance = %account.balance(), version = account.version(), "✅ Deposit and withdrawal committed");

    match handler.handle(id, AccountCommand::Withdraw { amount: 1_000_000 }).await {
        Ok(_) => tracing::warn!("Overdraft unexpectedly accepted"),
        Err(e) => tracing::info!(error = %e, "✅ Overdraft rejected"),
    }

    // Two writers from the same loaded state: exactly one wins
    let mut first = repository.load_by_id(&id).await?.context("Account vanished")?;
    let mut second = first.clone();
    first.deposit(10)?;
    second.deposit(20)?;

    let outcomes = join_all([repository.save(&mut first), repository.save(&mut second)]).await;
    for outcome in &outcomes {
        match outcome {
            Ok(version) => tracing::info!(version, "✅ Save won the race"),
            Err(e) if e.is_concurrency_conflict() => tracing::info!(error = %e, "⚔️ Save lost the race"),
            Err(e) => tracing::error!(error = %e, "Save failed"),
        }
    }

    // Same race through the handler: conflicts are retried from a fresh load
    let deposits = (1..=5).map(|i| handler.handle(id, AccountCommand::Deposit { amount: i * 100 }));
    let results = join_all(deposits).await;
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    tracing::info!(succeeded, attempted = results.len(), "✅ Concurrent deposits through the handler");

    let reloaded = repository.load_by_id(&id).await?.context("Account vanished")?;
    tracing::info!(balance = %reloaded.balance(), version = reloaded.version(), "📖 Write model");

    match queries.get_account(&id).await? {
        Some(view) => tracing::info!(balance = view.balance, status = %view.status, version = view.version, "📖 Read model"),
        None => tracing::warn!(account_id = %id, "Read model has no row for account"),
    }

    Ok(())
}

async fn run_user_demo(repository: UserRepository, queries: &UserQueryService) -> anyhow::Result<()> {
    let handler = UserCommandHandler::new(repository.clone());

    let user = handler.register("ada@example.com", "Ada Lovelace").await?;
    let id = user.id();
    tracing::info!(user_id = %id, status = %user.status(), "✅ User registered");

    let user: User = handler.handle(id, UserCommand::Verify).await?;
    tracing::info!(user_id = %id, status = %user.status(), version = user.version(), "✅ User verified");

    match handler.handle(id, UserCommand::Verify).await {
        Ok(_) => tracing::warn!("Second verification unexpectedly accepted"),
        Err(e) => tracing::info!(error = %e, "✅ Second verification rejected"),
    }

    match queries.find_by_email("ada@example.com").await? {
        Some(view) => tracing::info!(user_id = %view.user_id, status = %view.status, version = view.version, "📖 User read model"),
        None => tracing::warn!(user_id = %id, "Read model has no row for user"),
    }

    Ok(())
}
