// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rivalwatch::application::usecases::manage_targets::ManageTargetsUseCase;
use rivalwatch::config::settings::Settings;
use rivalwatch::domain::repositories::change_repository::ChangeRepository;
use rivalwatch::domain::repositories::job_repository::JobRepository;
use rivalwatch::domain::repositories::notification_repository::NotificationRepository;
use rivalwatch::domain::repositories::snapshot_repository::SnapshotRepository;
use rivalwatch::domain::repositories::target_repository::TargetRepository;
use rivalwatch::domain::services::change_ledger::ChangeLedger;
use rivalwatch::domain::services::insight_service::InsightService;
use rivalwatch::domain::services::llm_service::LlmService;
use rivalwatch::domain::services::notification_service::{NotificationDelivery, NotificationService};
use rivalwatch::engines::http_fetcher::HttpFetcher;
use rivalwatch::engines::selector_extractor::SelectorExtractor;
use rivalwatch::infrastructure::database::connection;
use rivalwatch::infrastructure::metrics;
use rivalwatch::infrastructure::repositories::change_repo_impl::ChangeRepositoryImpl;
use rivalwatch::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use rivalwatch::infrastructure::repositories::notification_repo_impl::NotificationRepositoryImpl;
use rivalwatch::infrastructure::repositories::snapshot_repo_impl::SnapshotRepositoryImpl;
use rivalwatch::infrastructure::repositories::target_repo_impl::TargetRepositoryImpl;
use rivalwatch::infrastructure::services::webhook_delivery::WebhookDelivery;
use rivalwatch::presentation::routes::{self, AppState};
use rivalwatch::queue::job_queue::{JobQueue, PersistentJobQueue};
use rivalwatch::queue::scheduler::JobScheduler;
use rivalwatch::queue::target_locks::TargetLocks;
use rivalwatch::utils::telemetry;
use rivalwatch::workers::manager::WorkerManager;
use rivalwatch::workers::notification_worker::{self, NotificationDispatcher};
use rivalwatch::workers::scrape_worker::ScrapeContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use migration::{Migrator, MigratorTrait};

/// 流水线事件通道容量
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        telemetry::init_json_telemetry();
    } else {
        telemetry::init_telemetry();
    }
    info!("Starting rivalwatch...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    // Initialize Prometheus Metrics
    metrics::init_metrics(&settings.metrics.address);

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize repositories and services
    let targets: Arc<dyn TargetRepository> = Arc::new(TargetRepositoryImpl::new(db.clone()));
    let jobs: Arc<dyn JobRepository> = Arc::new(JobRepositoryImpl::new(db.clone()));
    let snapshots: Arc<dyn SnapshotRepository> = Arc::new(SnapshotRepositoryImpl::new(db.clone()));
    let changes: Arc<dyn ChangeRepository> = Arc::new(ChangeRepositoryImpl::new(db.clone()));
    let notification_repo: Arc<dyn NotificationRepository> =
        Arc::new(NotificationRepositoryImpl::new(db.clone()));

    let delivery: Option<Arc<dyn NotificationDelivery>> = match &settings.notifications.webhook_url {
        Some(url) => Some(Arc::new(WebhookDelivery::new(
            url.clone(),
            settings.notifications.secret.clone(),
            Duration::from_secs(settings.notifications.delivery_timeout_secs),
        )?)),
        None => {
            info!("No webhook configured, notifications are recorded only");
            None
        }
    };
    let notifications = NotificationService::new(notification_repo, delivery);
    let ledger = ChangeLedger::new(changes);
    let insights = Arc::new(InsightService::new(
        ledger.clone(),
        targets.clone(),
        Arc::new(LlmService::new(&settings.llm)),
        notifications.clone(),
    ));

    let queue: Arc<dyn JobQueue> = Arc::new(PersistentJobQueue::new(jobs.clone()));
    let scheduler = Arc::new(
        JobScheduler::new(
            targets.clone(),
            jobs.clone(),
            queue.clone(),
            settings.scheduler.history_per_target,
        )
        .with_stale_after(
            settings.worker.job_deadline() + Duration::from_secs(settings.scheduler.stale_grace_secs),
        ),
    );

    // 5. Recover jobs left active by a previous process
    let readmitted = scheduler.recover_interrupted().await?;
    if !readmitted.is_empty() {
        warn!("Recovered {} interrupted jobs", readmitted.len());
    }

    // 6. Start workers and the notification dispatcher
    let (events, receiver) = notification_worker::channel(EVENT_CHANNEL_CAPACITY);
    let context = ScrapeContext {
        queue,
        targets: targets.clone(),
        snapshots: snapshots.clone(),
        fetcher: Arc::new(HttpFetcher::new()?),
        extractor: Arc::new(SelectorExtractor::new()),
        execution_locks: TargetLocks::new(),
        events,
    };
    let mut worker_manager = WorkerManager::new(
        context,
        settings.worker.clone(),
        Duration::from_millis(settings.scheduler.poll_interval_ms),
    );
    worker_manager.start_workers(settings.scheduler.worker_count);
    worker_manager.start_dispatcher(NotificationDispatcher::new(
        receiver,
        notifications.clone(),
        settings.notifications.emit_scrape_events,
    ));

    // 7. Start the scheduling tick
    let ticker = scheduler
        .clone()
        .start_ticker(Duration::from_secs(settings.scheduler.tick_interval_secs.max(1)));

    // 8. Start HTTP server
    let app = routes::routes(AppState {
        scheduler,
        targets: Arc::new(ManageTargetsUseCase::new(targets, snapshots)),
        ledger,
        insights,
        notifications,
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    ticker.abort();
    worker_manager.shutdown();

    Ok(())
}
