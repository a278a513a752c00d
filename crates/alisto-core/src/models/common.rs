//! Envelope, pagination and shared enums used across the API.

use serde::{Deserialize, Serialize};

/// Response envelope returned by every backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub timestamp: Option<String>,
    pub request_id: Option<String>,
}

/// One page of a paginated collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl<T> Page<T> {
    pub fn info(&self) -> PageInfo {
        PageInfo {
            page_number: self.page_number,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
        }
    }

    pub fn into_parts(self) -> (Vec<T>, PageInfo) {
        let info = self.info();
        (self.items, info)
    }
}

/// Page metadata without the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Query for one page. Filter fields are flattened into the same query string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest<F> {
    pub page_number: u32,
    pub page_size: u32,
    #[serde(flatten)]
    pub filter: F,
}

impl<F> PageRequest<F> {
    pub fn first(page_size: u32, filter: F) -> Self {
        Self {
            page_number: 1,
            page_size,
            filter,
        }
    }
}

/// Filter for endpoints that take no extra parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NoFilter {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrgencyLevel::Low => write!(f, "Low"),
            UrgencyLevel::Medium => write!(f, "Medium"),
            UrgencyLevel::High => write!(f, "High"),
            UrgencyLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Stored file metadata (issue photos, uploads).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub uploaded_at: Option<String>,
}
