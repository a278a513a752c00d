//! Ready-made fetchers for each screen's data.
//!
//! Paginated lists (news, appointments, reports, projects, notifications)
//! are `PagedFetcher`s; everything else is a plain `Fetcher`. Service
//! categories and hotlines rarely change and are read through the TTL cache.

use crate::api::ApiClient;
use crate::cache::{durations, keys, TtlCache};
use crate::fetch::{page_loader, Fetcher, PagedFetcher};
use crate::models::{
    Appointment, AppointmentFilter, CityService, DashboardStats, EmergencyHotline, IssueReport,
    IssueReportFilter, NewsArticle, NewsFilter, Notification, NotificationFilter, PageRequest,
    ProjectFilter, PublicProject, ServiceCategory, TouristSpot, TouristSpotQuery,
};

const NEWS_PAGE_SIZE: u32 = 10;
const APPOINTMENTS_PAGE_SIZE: u32 = 10;
const REPORTS_PAGE_SIZE: u32 = 10;
const PROJECTS_PAGE_SIZE: u32 = 10;
const NOTIFICATIONS_PAGE_SIZE: u32 = 20;

/// Builds fetchers bound to one API client and cache.
/// Clone is cheap - both halves are reference counted.
#[derive(Clone)]
pub struct Feeds {
    api: ApiClient,
    cache: TtlCache,
}

impl Feeds {
    pub fn new(api: ApiClient, cache: TtlCache) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ===== Paginated =====

    pub fn news(&self, filter: NewsFilter) -> PagedFetcher<NewsArticle, NewsFilter> {
        let api = self.api.clone();
        PagedFetcher::new(
            NEWS_PAGE_SIZE,
            filter,
            page_loader(move |req: PageRequest<NewsFilter>| {
                let api = api.clone();
                async move { api.news(&req).await }
            }),
        )
    }

    pub fn appointments(&self, filter: AppointmentFilter) -> PagedFetcher<Appointment, AppointmentFilter> {
        let api = self.api.clone();
        PagedFetcher::new(
            APPOINTMENTS_PAGE_SIZE,
            filter,
            page_loader(move |req: PageRequest<AppointmentFilter>| {
                let api = api.clone();
                async move { api.user_appointments(&req).await }
            }),
        )
    }

    pub fn issue_reports(&self, filter: IssueReportFilter) -> PagedFetcher<IssueReport, IssueReportFilter> {
        let api = self.api.clone();
        PagedFetcher::new(
            REPORTS_PAGE_SIZE,
            filter,
            page_loader(move |req: PageRequest<IssueReportFilter>| {
                let api = api.clone();
                async move { api.user_issue_reports(&req).await }
            }),
        )
    }

    pub fn public_projects(&self, filter: ProjectFilter) -> PagedFetcher<PublicProject, ProjectFilter> {
        let api = self.api.clone();
        PagedFetcher::new(
            PROJECTS_PAGE_SIZE,
            filter,
            page_loader(move |req: PageRequest<ProjectFilter>| {
                let api = api.clone();
                async move { api.public_projects(&req).await }
            }),
        )
    }

    pub fn notifications(&self, filter: NotificationFilter) -> PagedFetcher<Notification, NotificationFilter> {
        let api = self.api.clone();
        PagedFetcher::new(
            NOTIFICATIONS_PAGE_SIZE,
            filter,
            page_loader(move |req: PageRequest<NotificationFilter>| {
                let api = api.clone();
                async move { api.notifications(&req).await }
            }),
        )
    }

    // ===== Lists =====

    pub fn tourist_spots(&self, query: TouristSpotQuery) -> Fetcher<Vec<TouristSpot>> {
        let api = self.api.clone();
        Fetcher::new(move || {
            let api = api.clone();
            let query = query.clone();
            async move { api.tourist_spots(&query).await }
        })
    }

    pub fn service_categories(&self) -> Fetcher<Vec<ServiceCategory>> {
        let (api, cache) = (self.api.clone(), self.cache.clone());
        Fetcher::new(move || {
            let (api, cache) = (api.clone(), cache.clone());
            async move {
                cache
                    .get_or_fetch(keys::SERVICE_CATEGORIES, durations::DAY, || async {
                        api.service_categories().await
                    })
                    .await
            }
        })
    }

    pub fn services(&self, category_id: Option<i64>) -> Fetcher<Vec<CityService>> {
        let api = self.api.clone();
        Fetcher::new(move || {
            let api = api.clone();
            async move { api.services(category_id).await }
        })
    }

    pub fn hotlines(&self) -> Fetcher<Vec<EmergencyHotline>> {
        let (api, cache) = (self.api.clone(), self.cache.clone());
        Fetcher::new(move || {
            let (api, cache) = (api.clone(), cache.clone());
            async move {
                cache
                    .get_or_fetch(keys::EMERGENCY_HOTLINES, durations::DAY, || async {
                        api.emergency_hotlines().await
                    })
                    .await
            }
        })
    }

    pub fn dashboard(&self) -> Fetcher<DashboardStats> {
        let api = self.api.clone();
        Fetcher::new(move || {
            let api = api.clone();
            async move { api.dashboard_stats().await }
        })
    }

    // ===== Single items =====

    pub fn news_article(&self, id: i64) -> Fetcher<NewsArticle> {
        let api = self.api.clone();
        Fetcher::new(move || {
            let api = api.clone();
            async move { api.news_by_id(id).await }
        })
    }

    pub fn service(&self, id: i64) -> Fetcher<CityService> {
        let api = self.api.clone();
        Fetcher::new(move || {
            let api = api.clone();
            async move { api.service_by_id(id).await }
        })
    }

    pub fn appointment(&self, id: &str) -> Fetcher<Appointment> {
        let api = self.api.clone();
        let id = id.to_string();
        Fetcher::new(move || {
            let api = api.clone();
            let id = id.clone();
            async move { api.appointment_by_id(&id).await }
        })
    }

    pub fn issue_report(&self, id: &str) -> Fetcher<IssueReport> {
        let api = self.api.clone();
        let id = id.to_string();
        Fetcher::new(move || {
            let api = api.clone();
            let id = id.clone();
            async move { api.issue_report_by_id(&id).await }
        })
    }

    pub fn tourist_spot(&self, id: i64) -> Fetcher<TouristSpot> {
        let api = self.api.clone();
        Fetcher::new(move || {
            let api = api.clone();
            async move { api.tourist_spot_by_id(id).await }
        })
    }

    pub fn project(&self, id: i64) -> Fetcher<PublicProject> {
        let api = self.api.clone();
        Fetcher::new(move || {
            let api = api.clone();
            async move { api.project_by_id(id).await }
        })
    }
}
