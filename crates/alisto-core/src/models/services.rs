use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceCategory {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon_name: Option<String>,
    pub sort_order: i32,
    pub services: Vec<CityService>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CityService {
    pub id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub fee: f64,
    pub processing_time: Option<String>,
    pub required_documents: Vec<String>,
    pub office_location: Option<String>,
    pub contact_number: Option<String>,
    pub operating_hours: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "Pending"),
            AppointmentStatus::Confirmed => write!(f, "Confirmed"),
            AppointmentStatus::InProgress => write!(f, "In Progress"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
            AppointmentStatus::NoShow => write!(f, "No Show"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub reference_number: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub total_fee: f64,
    pub payment_status: Option<PaymentStatus>,
    pub service_name: Option<String>,
    pub service_category: Option<String>,
    pub applicant_first_name: Option<String>,
    pub applicant_last_name: Option<String>,
    pub applicant_contact_number: Option<String>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
}

impl Appointment {
    /// Whether the citizen can still cancel or reschedule.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentApplicant {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub service_id: i64,
    pub appointment_date: String,
    pub appointment_time: String,
    pub applicant: AppointmentApplicant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_specific_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
}
