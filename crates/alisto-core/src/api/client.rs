//! API client for the Alisto backend.
//!
//! `ApiClient` wraps a pooled `reqwest::Client`, adds the bearer token when one
//! is set, retries rate-limited requests and unwraps the response envelope.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    ApiResponse, Appointment, AppointmentFilter, AuthResponse, CityService,
    CreateAppFeedbackRequest, CreateAppointmentRequest, CreateIssueReportRequest,
    CreateServiceFeedbackRequest, DashboardStats, EmergencyHotline, IssueReport,
    IssueReportFilter, LoginRequest, NewsArticle, NewsFilter, Notification, NotificationFilter,
    Page, PageRequest, ProjectFilter, PublicProject, RegisterRequest, ServiceCategory,
    TouristSpot, TouristSpotQuery, UpdateUserRequest, User,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when neither config nor environment provide one.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct CancelBody<'a> {
    reason: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleBody<'a> {
    appointment_date: &'a str,
    appointment_time: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServicesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    category_id: Option<i64>,
}

/// Some list endpoints answer with a bare array, others with a page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListOrPage<T> {
    List(Vec<T>),
    Page(Page<T>),
}

impl<T> ListOrPage<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            ListOrPage::List(items) => items,
            ListOrPage::Page(page) => page.items,
        }
    }
}

/// API client for the Alisto backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    origin: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `https://city.example/api`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        let origin = parsed.origin().ascii_serialization();

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            origin,
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            origin: self.origin.clone(),
            token: Some(token),
        }
    }

    /// Resolve an image path from the API to a loadable URL.
    ///
    /// Absolute `http(s)` URLs are returned unchanged. Anything else is a
    /// path on the API server and is joined to the origin of the base URL
    /// (scheme and host), not to the base URL itself: uploads are served
    /// from `/uploads/...`, outside the `/api` prefix.
    pub fn image_url(&self, path: &str) -> String {
        let path = path.trim();
        if path.is_empty() || path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.origin, path)
        } else {
            format!("{}/{}", self.origin, path)
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        let status = response.status();
        if status.is_success() {
            Ok(Some(response))
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request built by `build`, retrying on 429 with exponential backoff.
    async fn execute<F>(&self, method: Method, endpoint: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = self.url(endpoint);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let request = build(
                self.client
                    .request(method.clone(), &url)
                    .headers(self.auth_headers()?),
            );
            debug!(%method, url = %url, "Sending request");
            let response = request
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// Parse the envelope and fail on `success: false`.
    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<ApiResponse<T>> {
        let text = response
            .text()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to read response body from {}", endpoint))?;
        let envelope: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("{} returned unexpected JSON: {}", endpoint, e))
        })?;
        if !envelope.success {
            return Err(ApiError::rejected(envelope.message, &envelope.errors).into());
        }
        Ok(envelope)
    }

    async fn send<T, F>(&self, method: Method, endpoint: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let response = self.execute(method, endpoint, build).await?;
        let envelope = Self::read_envelope::<T>(response, endpoint).await?;
        envelope.data.ok_or_else(|| {
            ApiError::InvalidResponse(format!("{} returned no data", endpoint)).into()
        })
    }

    /// For endpoints whose envelope carries no meaningful data.
    async fn send_unit<F>(&self, method: Method, endpoint: &str, build: F) -> Result<()>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let response = self.execute(method, endpoint, build).await?;
        Self::read_envelope::<serde_json::Value>(response, endpoint).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.send(Method::GET, endpoint, |req| req).await
    }

    async fn get_query<T: DeserializeOwned, Q: Serialize>(&self, endpoint: &str, query: &Q) -> Result<T> {
        self.send(Method::GET, endpoint, |req| req.query(query)).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, endpoint: &str, body: &B) -> Result<T> {
        self.send(Method::POST, endpoint, |req| req.json(body)).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, endpoint: &str, body: &B) -> Result<T> {
        self.send(Method::PUT, endpoint, |req| req.json(body)).await
    }

    /// Cheap reachability check used by the connectivity probe.
    pub async fn ping(&self) -> bool {
        match self.client.head(&self.base_url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Ping failed");
                false
            }
        }
    }

    // ===== Authentication =====

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            device_info: Some(format!("alisto/{}", env!("CARGO_PKG_VERSION"))),
        };
        self.post("/auth/login", &body).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.post("/auth/register", request).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<AuthResponse> {
        self.post("/auth/refresh", &RefreshTokenBody { refresh_token })
            .await
    }

    pub async fn logout(&self) -> Result<()> {
        self.send_unit(Method::POST, "/auth/logout", |req| req).await
    }

    // ===== Users =====

    pub async fn current_user(&self) -> Result<User> {
        self.get("/users/me").await
    }

    pub async fn update_user(&self, request: &UpdateUserRequest) -> Result<User> {
        self.put("/users/me", request).await
    }

    // ===== News =====

    pub async fn news(&self, request: &PageRequest<NewsFilter>) -> Result<Page<NewsArticle>> {
        self.get_query("/news", request).await
    }

    pub async fn news_by_id(&self, id: i64) -> Result<NewsArticle> {
        self.get(&format!("/news/{}", id)).await
    }

    pub async fn increment_news_view(&self, id: i64) -> Result<()> {
        self.send_unit(Method::POST, &format!("/news/{}/view", id), |req| req)
            .await
    }

    // ===== City services =====

    pub async fn service_categories(&self) -> Result<Vec<ServiceCategory>> {
        self.get("/services/categories").await
    }

    pub async fn services(&self, category_id: Option<i64>) -> Result<Vec<CityService>> {
        self.get_query("/services", &ServicesQuery { category_id })
            .await
    }

    pub async fn service_by_id(&self, id: i64) -> Result<CityService> {
        self.get(&format!("/services/{}", id)).await
    }

    // ===== Appointments =====

    pub async fn create_appointment(&self, request: &CreateAppointmentRequest) -> Result<Appointment> {
        self.post("/appointments", request).await
    }

    pub async fn user_appointments(
        &self,
        request: &PageRequest<AppointmentFilter>,
    ) -> Result<Page<Appointment>> {
        self.get_query("/appointments/my", request).await
    }

    pub async fn appointment_by_id(&self, id: &str) -> Result<Appointment> {
        self.get(&format!("/appointments/{}", id)).await
    }

    pub async fn cancel_appointment(&self, id: &str, reason: &str) -> Result<()> {
        let body = CancelBody { reason };
        self.send_unit(Method::PUT, &format!("/appointments/{}/cancel", id), |req| {
            req.json(&body)
        })
        .await
    }

    pub async fn reschedule_appointment(&self, id: &str, date: &str, time: &str) -> Result<()> {
        let body = RescheduleBody {
            appointment_date: date,
            appointment_time: time,
        };
        self.send_unit(Method::PUT, &format!("/appointments/{}/reschedule", id), |req| {
            req.json(&body)
        })
        .await
    }

    // ===== Issue reports =====

    pub async fn create_issue_report(&self, request: &CreateIssueReportRequest) -> Result<IssueReport> {
        self.post("/reports", request).await
    }

    pub async fn user_issue_reports(
        &self,
        request: &PageRequest<IssueReportFilter>,
    ) -> Result<Page<IssueReport>> {
        self.get_query("/reports/my", request).await
    }

    pub async fn issue_report_by_id(&self, id: &str) -> Result<IssueReport> {
        self.get(&format!("/reports/{}", id)).await
    }

    // ===== Tourism =====

    /// List tourist spots. Accepts either a bare list or a page from the server.
    pub async fn tourist_spots(&self, query: &TouristSpotQuery) -> Result<Vec<TouristSpot>> {
        let spots: ListOrPage<TouristSpot> = self.get_query("/tourism/spots", query).await?;
        Ok(spots.into_items())
    }

    pub async fn tourist_spot_by_id(&self, id: i64) -> Result<TouristSpot> {
        self.get(&format!("/tourism/spots/{}", id)).await
    }

    pub async fn increment_spot_view(&self, id: i64) -> Result<()> {
        self.send_unit(Method::POST, &format!("/tourism/spots/{}/view", id), |req| req)
            .await
    }

    // ===== Transparency =====

    pub async fn public_projects(
        &self,
        request: &PageRequest<ProjectFilter>,
    ) -> Result<Page<PublicProject>> {
        self.get_query("/transparency/projects", request).await
    }

    pub async fn project_by_id(&self, id: i64) -> Result<PublicProject> {
        self.get(&format!("/transparency/projects/{}", id)).await
    }

    // ===== Emergency =====

    pub async fn emergency_hotlines(&self) -> Result<Vec<EmergencyHotline>> {
        let mut hotlines: Vec<EmergencyHotline> = self.get("/hotlines").await?;
        hotlines.sort_by_key(|h| h.sort_order);
        Ok(hotlines)
    }

    // ===== Notifications =====

    pub async fn notifications(
        &self,
        request: &PageRequest<NotificationFilter>,
    ) -> Result<Page<Notification>> {
        self.get_query("/notifications", request).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<()> {
        self.send_unit(Method::PUT, &format!("/notifications/{}/read", id), |req| req)
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        self.send_unit(Method::PUT, "/notifications/read-all", |req| req)
            .await
    }

    // ===== Feedback =====

    pub async fn submit_service_feedback(&self, request: &CreateServiceFeedbackRequest) -> Result<()> {
        self.send_unit(Method::POST, "/feedback/service", |req| req.json(request))
            .await
    }

    pub async fn submit_app_feedback(&self, request: &CreateAppFeedbackRequest) -> Result<()> {
        self.send_unit(Method::POST, "/feedback/app", |req| req.json(request))
            .await
    }

    // ===== Statistics =====

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.get("/stats/dashboard").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(REQUEST_TIMEOUT_SECS)).unwrap()
    }

    #[test]
    fn test_image_url() {
        let api = client("https://alisto.example");
        assert_eq!(api.image_url("/uploads/x.png"), "https://alisto.example/uploads/x.png");
        assert_eq!(api.image_url("uploads/x.png"), "https://alisto.example/uploads/x.png");
        assert_eq!(api.image_url("https://cdn.example/y.png"), "https://cdn.example/y.png");
        assert_eq!(api.image_url(""), "");
    }

    #[test]
    fn test_image_url_uses_origin_not_api_path() {
        let api = client("http://localhost:5000/api/");
        assert_eq!(api.base_url(), "http://localhost:5000/api");
        assert_eq!(api.image_url("/uploads/a.jpg"), "http://localhost:5000/uploads/a.jpg");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_with_token_keeps_base_url() {
        let api = client("https://alisto.example/api");
        assert!(!api.has_token());
        let authed = api.with_token("abc".to_string());
        assert!(authed.has_token());
        assert_eq!(authed.base_url(), "https://alisto.example/api");
        let headers = authed.auth_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_list_or_page() {
        let list: ListOrPage<u8> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(list.into_items(), vec![1, 2]);
        let page: ListOrPage<u8> = serde_json::from_str(
            r#"{"items":[3],"totalCount":1,"pageNumber":1,"pageSize":20,"totalPages":1,"hasNextPage":false,"hasPreviousPage":false}"#,
        )
        .unwrap();
        assert_eq!(page.into_items(), vec![3]);
    }
}
