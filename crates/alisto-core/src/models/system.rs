use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    Appointment,
    IssueUpdate,
    News,
    Emergency,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: Option<String>,
    pub related_entity_id: Option<String>,
    pub action_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmergencyHotline {
    pub id: i64,
    pub name: String,
    pub phone_number: String,
    pub alternate_number: Option<String>,
    pub department: Option<String>,
    pub description: Option<String>,
    pub is_available_24_hours: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackType {
    BugReport,
    FeatureRequest,
    General,
    Complaint,
    Compliment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceFeedbackRequest {
    pub appointment_id: String,
    /// 1 to 5.
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppFeedbackRequest {
    pub feedback_type: FeedbackType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_appointments: u64,
    pub pending_appointments: u64,
    pub completed_appointments: u64,
    pub total_reports: u64,
    pub resolved_reports: u64,
    pub unread_notifications: u64,
    pub service_usage: Vec<ServiceUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceUsage {
    pub service_name: String,
    pub count: u64,
}
