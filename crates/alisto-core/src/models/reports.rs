use serde::{Deserialize, Serialize};

use super::common::{FileReference, Priority, UrgencyLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCategory {
    Infrastructure,
    Utilities,
    Environment,
    PublicSafety,
    Traffic,
    Sanitation,
    Noise,
    Other,
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueCategory::Infrastructure => write!(f, "Infrastructure"),
            IssueCategory::Utilities => write!(f, "Utilities"),
            IssueCategory::Environment => write!(f, "Environment"),
            IssueCategory::PublicSafety => write!(f, "Public Safety"),
            IssueCategory::Traffic => write!(f, "Traffic"),
            IssueCategory::Sanitation => write!(f, "Sanitation"),
            IssueCategory::Noise => write!(f, "Noise"),
            IssueCategory::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueStatus {
    Submitted,
    UnderReview,
    InProgress,
    Resolved,
    Closed,
    Rejected,
}

impl IssueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IssueStatus::Resolved | IssueStatus::Closed | IssueStatus::Rejected
        )
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueStatus::Submitted => write!(f, "Submitted"),
            IssueStatus::UnderReview => write!(f, "Under Review"),
            IssueStatus::InProgress => write!(f, "In Progress"),
            IssueStatus::Resolved => write!(f, "Resolved"),
            IssueStatus::Closed => write!(f, "Closed"),
            IssueStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePhoto {
    pub id: String,
    pub file: Option<FileReference>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpdate {
    pub id: String,
    pub status: IssueStatus,
    pub message: String,
    pub created_at: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReport {
    pub id: String,
    pub reference_number: String,
    pub category: IssueCategory,
    pub urgency_level: UrgencyLevel,
    pub description: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: IssueStatus,
    pub priority: Option<Priority>,
    pub assigned_department: Option<String>,
    pub created_at: Option<String>,
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub photos: Vec<IssuePhoto>,
    #[serde(default)]
    pub updates: Vec<IssueUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueReportRequest {
    pub category: IssueCategory,
    pub urgency_level: UrgencyLevel,
    pub description: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReportFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<IssueCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_parses() {
        let json = r#"{
            "id": "r-1",
            "referenceNumber": "ISS-2025-0042",
            "category": "PublicSafety",
            "urgencyLevel": "High",
            "description": "Broken streetlight",
            "location": "Poblacion",
            "status": "UnderReview"
        }"#;
        let report: IssueReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.category.to_string(), "Public Safety");
        assert_eq!(report.status.to_string(), "Under Review");
        assert!(!report.status.is_terminal());
        assert!(report.photos.is_empty());
    }
}
