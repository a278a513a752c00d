use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiClient;
use crate::models::{
    CreateAppFeedbackRequest, CreateAppointmentRequest, CreateIssueReportRequest,
    CreateServiceFeedbackRequest,
};

/// The mutations the app knows how to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    CreateAppointment,
    CancelAppointment,
    CreateIssueReport,
    SubmitFeedback,
    SubmitServiceFeedback,
    MarkNotificationRead,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::CreateAppointment,
        ActionKind::CancelAppointment,
        ActionKind::CreateIssueReport,
        ActionKind::SubmitFeedback,
        ActionKind::SubmitServiceFeedback,
        ActionKind::MarkNotificationRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateAppointment => "CREATE_APPOINTMENT",
            ActionKind::CancelAppointment => "CANCEL_APPOINTMENT",
            ActionKind::CreateIssueReport => "CREATE_ISSUE_REPORT",
            ActionKind::SubmitFeedback => "SUBMIT_FEEDBACK",
            ActionKind::SubmitServiceFeedback => "SUBMIT_SERVICE_FEEDBACK",
            ActionKind::MarkNotificationRead => "MARK_NOTIFICATION_READ",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Replays one kind of pending action.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, payload: &Value) -> Result<()>;
}

type ExecFn = dyn Fn(Value) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Executor backed by a closure.
pub struct FnExecutor {
    f: Box<ExecFn>,
}

#[async_trait]
impl ActionExecutor for FnExecutor {
    async fn execute(&self, payload: &Value) -> Result<()> {
        (self.f)(payload.clone()).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelPayload {
    appointment_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload {
    notification_id: String,
}

/// Replays civic actions against the backend.
pub struct ApiExecutor {
    api: ApiClient,
    kind: ActionKind,
}

impl ApiExecutor {
    pub fn new(api: ApiClient, kind: ActionKind) -> Self {
        Self { api, kind }
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, payload: &Value) -> Result<T> {
        serde_json::from_value(payload.clone())
            .with_context(|| format!("Malformed payload for {}", self.kind))
    }
}

#[async_trait]
impl ActionExecutor for ApiExecutor {
    async fn execute(&self, payload: &Value) -> Result<()> {
        match self.kind {
            ActionKind::CreateAppointment => {
                let request: CreateAppointmentRequest = self.decode(payload)?;
                self.api.create_appointment(&request).await.map(|_| ())
            }
            ActionKind::CancelAppointment => {
                let cancel: CancelPayload = self.decode(payload)?;
                self.api
                    .cancel_appointment(&cancel.appointment_id, &cancel.reason)
                    .await
            }
            ActionKind::CreateIssueReport => {
                let request: CreateIssueReportRequest = self.decode(payload)?;
                self.api.create_issue_report(&request).await.map(|_| ())
            }
            ActionKind::SubmitFeedback => {
                let request: CreateAppFeedbackRequest = self.decode(payload)?;
                self.api.submit_app_feedback(&request).await
            }
            ActionKind::SubmitServiceFeedback => {
                let request: CreateServiceFeedbackRequest = self.decode(payload)?;
                self.api.submit_service_feedback(&request).await
            }
            ActionKind::MarkNotificationRead => {
                let n: NotificationPayload = self.decode(payload)?;
                self.api.mark_notification_read(&n.notification_id).await
            }
        }
    }
}

/// Maps action kind strings to their executors. Built once at startup.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    executors: HashMap<String, Arc<dyn ActionExecutor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an `ApiExecutor` for every `ActionKind`.
    pub fn for_api(api: ApiClient) -> Self {
        let mut registry = Self::new();
        for kind in ActionKind::ALL {
            registry.register(kind.as_str(), Arc::new(ApiExecutor::new(api.clone(), kind)));
        }
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, executor: Arc<dyn ActionExecutor>) {
        self.executors.insert(kind.into(), executor);
    }

    pub fn register_fn<F, Fut>(&mut self, kind: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let executor = FnExecutor {
            f: Box::new(move |payload| f(payload).boxed()),
        };
        self.register(kind, Arc::new(executor));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ActionExecutor>> {
        self.executors.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.executors.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}
