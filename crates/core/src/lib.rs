pub mod backend;
pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use backend::factory::BackendFactory;
use backend::traits::Backend;
use errors::CoreError;
use models::analytics::{AnalyticsFilter, AnalyticsSummary};
use models::issue::Issue;
use models::portfolio::PortfolioView;
use models::resource::Resource;
use models::session::Audience;
use models::settings::{BackendConfig, DEFAULT_STORAGE_BUCKET};
use models::stock::{Stock, StockDetail};
use services::{
    access_service::AccessService,
    analytics_service::AnalyticsService,
    import_service::{ImportReport, ImportService},
    issue_service::IssueService,
    portfolio_service::PortfolioService,
    resource_service::ResourceService,
    session_service::{RpcCodeVerifier, SessionGate},
    stock_service::StockService,
};
use storage::session_store::SessionStore;
use storage::store::KeyValueStore;

/// Where the admin connection comes from.
enum AdminConnection {
    /// Built on demand from the stored admin code.
    Remote(BackendFactory),
    /// Supplied up front (in-memory backends, tests).
    Fixed(Arc<dyn Backend>),
}

/// Main entry point for the research CMS core library.
///
/// Holds the public backend connection, the local key/value store the
/// session gates persist into, and every content service.
#[must_use]
pub struct ResearchCms {
    public: Arc<dyn Backend>,
    admin: AdminConnection,
    store: Arc<dyn KeyValueStore>,
    client_code_version: Option<String>,
    stock_service: StockService,
    issue_service: IssueService,
    portfolio_service: PortfolioService,
    access_service: AccessService,
    resource_service: ResourceService,
    analytics_service: AnalyticsService,
    import_service: ImportService,
}

impl std::fmt::Debug for ResearchCms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let admin = match &self.admin {
            AdminConnection::Remote(_) => "remote",
            AdminConnection::Fixed(_) => "fixed",
        };
        f.debug_struct("ResearchCms")
            .field("backend", &self.public.name())
            .field("admin", &admin)
            .field("bucket", &self.resource_service.bucket())
            .field("client_code_version", &self.client_code_version)
            .finish()
    }
}

impl ResearchCms {
    /// Connect to the hosted backend described by `config`.
    pub fn new(config: BackendConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, CoreError> {
        let factory = BackendFactory::new(config)?;
        let public = factory.public_client()?;
        let bucket = factory.config().storage_bucket.clone();
        let version = factory.config().client_code_version.clone();
        log::info!("Research CMS connected to {}", factory.config().url);
        Ok(Self::build(public, AdminConnection::Remote(factory), store, bucket, version))
    }

    /// Use ready-made backends, e.g. two handles on one `MemoryBackend`.
    pub fn with_backends(
        public: Arc<dyn Backend>,
        admin: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::build(
            public,
            AdminConnection::Fixed(admin),
            store,
            DEFAULT_STORAGE_BUCKET.to_string(),
            None,
        )
    }

    /// Require client sessions to carry this code version.
    pub fn with_client_code_version(mut self, version: impl Into<String>) -> Self {
        self.client_code_version = Some(version.into());
        self
    }

    fn build(
        public: Arc<dyn Backend>,
        admin: AdminConnection,
        store: Arc<dyn KeyValueStore>,
        bucket: String,
        client_code_version: Option<String>,
    ) -> Self {
        Self {
            public,
            admin,
            store,
            client_code_version,
            stock_service: StockService::new(),
            issue_service: IssueService::new(),
            portfolio_service: PortfolioService::new(),
            access_service: AccessService::new(),
            resource_service: ResourceService::new(bucket),
            analytics_service: AnalyticsService::new(),
            import_service: ImportService::new(),
        }
    }

    // ── Session gates ───────────────────────────────────────────────

    /// Gate in front of the client viewer. Call `mount` before rendering.
    pub fn client_gate(&self) -> SessionGate {
        self.gate(Audience::Client)
            .with_code_version(self.client_code_version.clone())
    }

    /// Gate in front of the back office.
    pub fn admin_gate(&self) -> SessionGate {
        self.gate(Audience::Admin)
    }

    fn gate(&self, audience: Audience) -> SessionGate {
        let store = SessionStore::new(audience, Arc::clone(&self.store));
        let verifier = RpcCodeVerifier::for_audience(Arc::clone(&self.public), audience);
        SessionGate::new(store, Arc::new(verifier))
    }

    /// Connection for back-office writes, carrying the stored admin code.
    ///
    /// Fails with `NotAuthenticated` when no admin code has been stored.
    /// Expiry is not re-checked here; the gate decides that on mount.
    pub fn admin_backend(&self) -> Result<Arc<dyn Backend>, CoreError> {
        let code = SessionStore::new(Audience::Admin, Arc::clone(&self.store))
            .load_extra()
            .ok_or(CoreError::NotAuthenticated)?;
        match &self.admin {
            AdminConnection::Remote(factory) => factory.admin_client(&code),
            AdminConnection::Fixed(backend) => Ok(Arc::clone(backend)),
        }
    }

    /// Public (anonymous) connection.
    pub fn public_backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.public)
    }

    // ── Client viewer ───────────────────────────────────────────────

    /// Active stocks, by name.
    pub async fn stocks(&self) -> Result<Vec<Stock>, CoreError> {
        self.stock_service.list_stocks(self.public.as_ref(), true).await
    }

    pub async fn stock_detail(&self, id: Uuid) -> Result<StockDetail, CoreError> {
        self.stock_service.get_stock_detail(self.public.as_ref(), id).await
    }

    pub async fn news_feed(&self, limit: usize) -> Result<Vec<Issue>, CoreError> {
        self.issue_service.news_feed(self.public.as_ref(), limit).await
    }

    pub async fn portfolios(&self) -> Result<Vec<PortfolioView>, CoreError> {
        self.portfolio_service
            .list_portfolios(self.public.as_ref(), true)
            .await
    }

    pub async fn resources(&self, category: Option<&str>) -> Result<Vec<Resource>, CoreError> {
        self.resource_service
            .list_resources(self.public.as_ref(), category)
            .await
    }

    /// Log a page view. Failures are logged and swallowed; analytics never
    /// blocks the viewer.
    pub async fn record_view(&self, page: &str, stock_id: Option<Uuid>, client_id: Option<Uuid>) {
        if let Err(e) = self
            .analytics_service
            .record_view(self.public.as_ref(), page, stock_id, client_id)
            .await
        {
            log::warn!("Failed to record view of {page}: {e}");
        }
    }

    // ── Back office ─────────────────────────────────────────────────

    /// Parse a spreadsheet export without touching the backend.
    pub fn parse_stock_sheet(&self, text: &str) -> Result<ImportReport, CoreError> {
        self.import_service.parse_stock_sheet(text)
    }

    /// Bulk-upsert the valid rows of a parsed sheet.
    pub async fn import_stocks(&self, report: &ImportReport) -> Result<usize, CoreError> {
        let admin = self.admin_backend()?;
        self.import_service.import_stocks(admin.as_ref(), report).await
    }

    /// Analytics dashboard for `[from, to]` (KST days, inclusive).
    pub async fn analytics_dashboard(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AnalyticsSummary, CoreError> {
        let admin = self.admin_backend()?;
        let names: HashMap<Uuid, String> = self
            .stock_service
            .list_stocks(admin.as_ref(), false)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();
        self.analytics_service
            .dashboard(admin.as_ref(), &AnalyticsFilter::new(from, to), &names)
            .await
    }

    // ── Services ────────────────────────────────────────────────────

    pub fn stock_service(&self) -> &StockService {
        &self.stock_service
    }

    pub fn issue_service(&self) -> &IssueService {
        &self.issue_service
    }

    pub fn portfolio_service(&self) -> &PortfolioService {
        &self.portfolio_service
    }

    pub fn access_service(&self) -> &AccessService {
        &self.access_service
    }

    pub fn resource_service(&self) -> &ResourceService {
        &self.resource_service
    }

    pub fn analytics_service(&self) -> &AnalyticsService {
        &self.analytics_service
    }

    pub fn import_service(&self) -> &ImportService {
        &self.import_service
    }
}
