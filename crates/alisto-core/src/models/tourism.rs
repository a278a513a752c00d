use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TouristSpot {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub image_url: Option<String>,
    pub rating: f64,
    pub review_count: u32,
    pub opening_hours: Option<String>,
    pub entrance_fee: Option<f64>,
    pub contact_number: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
    pub view_count: u64,
}

/// Query parameters for the tourist spot listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouristSpotQuery {
    pub page_number: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl Default for TouristSpotQuery {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 50,
            search_term: None,
            is_active: Some(true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Planned,
    Ongoing,
    Completed,
    Suspended,
    Cancelled,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Planned => write!(f, "Planned"),
            ProjectStatus::Ongoing => write!(f, "Ongoing"),
            ProjectStatus::Completed => write!(f, "Completed"),
            ProjectStatus::Suspended => write!(f, "Suspended"),
            ProjectStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProject {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub budget: f64,
    pub status: ProjectStatus,
    pub contractor: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub progress_percentage: f64,
    pub image_url: Option<String>,
}

impl PublicProject {
    /// Progress clamped to 0..=100, for gauges.
    pub fn progress(&self) -> f64 {
        self.progress_percentage.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_query_serializes_camel_case() {
        let query = TouristSpotQuery {
            search_term: Some("falls".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            serde_json::json!({"pageNumber": 1, "pageSize": 50, "searchTerm": "falls", "isActive": true})
        );
    }

    #[test]
    fn test_project_progress_is_clamped() {
        let json = r#"{"id":9,"title":"Bridge","description":"","location":"Brgy. 1","status":"Ongoing","progressPercentage":120.5}"#;
        let project: PublicProject = serde_json::from_str(json).unwrap();
        assert_eq!(project.progress(), 100.0);
        assert_eq!(project.budget, 0.0);
    }
}
