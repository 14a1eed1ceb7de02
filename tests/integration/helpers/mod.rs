use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use rivalwatch::application::usecases::manage_targets::ManageTargetsUseCase;
use rivalwatch::config::settings::{DatabaseSettings, WorkerSettings};
use rivalwatch::domain::models::change::{Change, ChangeKind};
use rivalwatch::domain::models::notification::Notification;
use rivalwatch::domain::models::snapshot::{ExtractedValue, Snapshot};
use rivalwatch::domain::models::target::{ContentCategory, RunOutcome, Target};
use rivalwatch::domain::repositories::change_repository::ChangeRepository;
use rivalwatch::domain::repositories::job_repository::JobRepository;
use rivalwatch::domain::repositories::notification_repository::NotificationRepository;
use rivalwatch::domain::repositories::snapshot_repository::{Observation, SnapshotRepository};
use rivalwatch::domain::repositories::target_repository::TargetRepository;
use rivalwatch::domain::services::change_ledger::ChangeLedger;
use rivalwatch::domain::services::insight_service::{
    ChangeContext, GenerationError, InsightGenerator, InsightService, TargetActivity, WeeklyReport,
};
use rivalwatch::domain::services::notification_service::{
    DeliveryError, NotificationDelivery, NotificationService,
};
use rivalwatch::engines::selector_extractor::SelectorExtractor;
use rivalwatch::engines::traits::{FetchError, FetchRequest, FetchedPage, Fetcher};
use rivalwatch::infrastructure::database::connection;
use rivalwatch::infrastructure::repositories::change_repo_impl::ChangeRepositoryImpl;
use rivalwatch::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use rivalwatch::infrastructure::repositories::notification_repo_impl::NotificationRepositoryImpl;
use rivalwatch::infrastructure::repositories::snapshot_repo_impl::SnapshotRepositoryImpl;
use rivalwatch::infrastructure::repositories::target_repo_impl::TargetRepositoryImpl;
use rivalwatch::presentation::routes::AppState;
use rivalwatch::queue::job_queue::{JobQueue, PersistentJobQueue};
use rivalwatch::queue::scheduler::JobScheduler;
use rivalwatch::queue::target_locks::TargetLocks;
use rivalwatch::utils::retry_policy::RetryPolicy;
use rivalwatch::workers::notification_worker::{self, PipelineEvent};
use rivalwatch::workers::scrape_worker::{ScrapeContext, ScrapeWorker};
use sea_orm::DatabaseConnection;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// 测试中保留的终止任务数量
pub const HISTORY_PER_TARGET: u64 = 5;

/// 按脚本依次返回响应的抓取器
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<FetchedPage, FetchError>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn push_html(&self, html: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(FetchedPage {
            status_code: 200,
            content: html.into(),
            content_type: "text/html".to_string(),
        }));
    }

    pub fn push_error(&self, error: FetchError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("no scripted response".to_string())))
    }
}

/// 可切换失败的洞察生成器
#[derive(Default)]
pub struct FakeGenerator {
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> Result<(), GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(GenerationError::Request("generator unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InsightGenerator for FakeGenerator {
    async fn change_insight(&self, context: &ChangeContext) -> Result<String, GenerationError> {
        self.call().await?;
        Ok(format!(
            "{} moved from {} to {}",
            context.target_name, context.old_value, context.new_value
        ))
    }

    async fn target_summary(
        &self,
        target_name: &str,
        changes: &[ChangeContext],
    ) -> Result<String, GenerationError> {
        self.call().await?;
        Ok(format!("{} made {} change(s)", target_name, changes.len()))
    }

    async fn weekly_report(&self, activity: &[TargetActivity]) -> Result<WeeklyReport, GenerationError> {
        self.call().await?;
        Ok(WeeklyReport {
            summary: format!("{} competitor(s) active", activity.len()),
            key_changes: activity.iter().map(|a| a.target_name.clone()).collect(),
            recommendations: vec!["Review pricing".to_string()],
        })
    }

    async fn recommendation(&self, context: &ChangeContext) -> Result<String, GenerationError> {
        self.call().await?;
        Ok(format!("Respond to the {} change", context.kind))
    }
}

/// 记录所有投递的通知
#[derive(Default)]
pub struct RecordingDelivery {
    delivered: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingDelivery {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDelivery for RecordingDelivery {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected(503));
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// 基于内存 SQLite 的完整测试环境
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub targets: Arc<dyn TargetRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub changes: Arc<dyn ChangeRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub queue: Arc<dyn JobQueue>,
    pub scheduler: Arc<JobScheduler>,
    pub ledger: ChangeLedger,
    pub notifications: NotificationService,
    pub insights: Arc<InsightService>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub generator: Arc<FakeGenerator>,
    pub delivery: Arc<RecordingDelivery>,
    pub context: ScrapeContext,
    pub events: mpsc::Receiver<PipelineEvent>,
}

impl TestApp {
    /// 使用快速超时与无等待重试的抓取工作器
    pub fn worker(&self) -> ScrapeWorker {
        self.worker_with(test_worker_settings())
    }

    pub fn worker_with(&self, settings: WorkerSettings) -> ScrapeWorker {
        let attempts = settings.max_fetch_attempts;
        ScrapeWorker::new(self.context.clone(), &settings, Duration::from_millis(10))
            .with_retry_policy(RetryPolicy::immediate(attempts))
    }

    pub fn manage_targets(&self) -> ManageTargetsUseCase {
        ManageTargetsUseCase::new(self.targets.clone(), self.snapshots.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            scheduler: self.scheduler.clone(),
            targets: Arc::new(self.manage_targets()),
            ledger: self.ledger.clone(),
            insights: self.insights.clone(),
            notifications: self.notifications.clone(),
        }
    }

    /// 取出当前已发出的所有流水线事件
    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub async fn seed_target(&self, category: ContentCategory, selector: Option<&str>) -> Target {
        let target = Target::new(
            format!("Competitor {}", &uuid::Uuid::new_v4().to_string()[..8]),
            "https://shop.example.com/item".to_string(),
            category,
            selector.map(str::to_string),
            3600,
        );
        self.targets.create(&target).await.unwrap()
    }

    pub async fn seed_price_target(&self) -> Target {
        self.seed_target(ContentCategory::Price, Some(".price")).await
    }

    /// 直接提交一条价格变更，绕过抓取流程
    pub async fn seed_change(&self, target: &Target, old: &str, new: &str) -> Change {
        let now = Utc::now();
        let change = Change::new(
            target.id,
            ChangeKind::Price,
            Some(old.to_string()),
            Some(new.to_string()),
            1.0,
            now,
        );
        let previous_hash = self
            .snapshots
            .find_current(target.id)
            .await
            .unwrap()
            .map(|s| s.content_hash);
        self.snapshots
            .commit_observation(Observation {
                job: None,
                snapshot: Snapshot::capture(target.id, ExtractedValue::Text(new.to_string()), now),
                previous_hash,
                changes: vec![change.clone()],
                outcome: RunOutcome::Changed,
            })
            .await
            .unwrap();
        change
    }
}

pub fn test_worker_settings() -> WorkerSettings {
    WorkerSettings {
        max_fetch_attempts: 3,
        fetch_timeout_secs: 5,
        job_deadline_secs: 10,
        initial_backoff_ms: 0,
        max_backoff_ms: 0,
    }
}

pub fn price_page(price: &str) -> String {
    format!(
        "<html><body><h1>Widget</h1><span class=\"price\">{}</span></body></html>",
        price
    )
}

pub async fn create_test_db() -> Arc<DatabaseConnection> {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
        min_connections: None,
        connect_timeout: None,
        idle_timeout: None,
    };
    let db = connection::create_pool(&settings)
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None).await.expect("Failed to run migrations");
    Arc::new(db)
}

pub async fn create_test_app() -> TestApp {
    let db = create_test_db().await;

    let targets: Arc<dyn TargetRepository> = Arc::new(TargetRepositoryImpl::new(db.clone()));
    let jobs: Arc<dyn JobRepository> = Arc::new(JobRepositoryImpl::new(db.clone()));
    let snapshots: Arc<dyn SnapshotRepository> = Arc::new(SnapshotRepositoryImpl::new(db.clone()));
    let changes: Arc<dyn ChangeRepository> = Arc::new(ChangeRepositoryImpl::new(db.clone()));
    let notification_repo: Arc<dyn NotificationRepository> =
        Arc::new(NotificationRepositoryImpl::new(db.clone()));

    let delivery = Arc::new(RecordingDelivery::default());
    let notifications = NotificationService::new(
        notification_repo.clone(),
        Some(delivery.clone() as Arc<dyn NotificationDelivery>),
    );
    let ledger = ChangeLedger::new(changes.clone());
    let generator = Arc::new(FakeGenerator::default());
    let insights = Arc::new(InsightService::new(
        ledger.clone(),
        targets.clone(),
        generator.clone(),
        notifications.clone(),
    ));

    let queue: Arc<dyn JobQueue> = Arc::new(PersistentJobQueue::new(jobs.clone()));
    let scheduler = Arc::new(JobScheduler::new(
        targets.clone(),
        jobs.clone(),
        queue.clone(),
        HISTORY_PER_TARGET,
    ));

    let fetcher = Arc::new(ScriptedFetcher::default());
    let (sender, events) = notification_worker::channel(64);
    let context = ScrapeContext {
        queue: queue.clone(),
        targets: targets.clone(),
        snapshots: snapshots.clone(),
        fetcher: fetcher.clone(),
        extractor: Arc::new(SelectorExtractor::new()),
        execution_locks: TargetLocks::new(),
        events: sender,
    };

    TestApp {
        db,
        targets,
        jobs,
        snapshots,
        changes,
        notification_repo,
        queue,
        scheduler,
        ledger,
        notifications,
        insights,
        fetcher,
        generator,
        delivery,
        context,
        events,
    }
}
