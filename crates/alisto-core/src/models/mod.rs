//! Data models for the Alisto backend.
//!
//! These mirror the JSON the API returns (camelCase fields) and include:
//!
//! - `common`: response envelope, pagination, shared enums
//! - `user`: accounts and authentication payloads
//! - `content`: news articles
//! - `services`: city services and appointments
//! - `reports`: citizen issue reports
//! - `tourism`: tourist spots and public (transparency) projects
//! - `system`: notifications, hotlines, feedback, dashboard statistics

pub mod common;
pub mod content;
pub mod reports;
pub mod services;
pub mod system;
pub mod tourism;
pub mod user;

pub use common::{
    ApiResponse, FileReference, NoFilter, Page, PageInfo, PageRequest, Priority, SortDirection,
    UrgencyLevel,
};
pub use content::{NewsArticle, NewsCategory, NewsFilter};
pub use reports::{
    CreateIssueReportRequest, IssueCategory, IssuePhoto, IssueReport, IssueReportFilter,
    IssueStatus, IssueUpdate,
};
pub use services::{
    Appointment, AppointmentApplicant, AppointmentFilter, AppointmentStatus, CityService,
    CreateAppointmentRequest, PaymentStatus, ServiceCategory,
};
pub use system::{
    CreateAppFeedbackRequest, CreateServiceFeedbackRequest, DashboardStats, EmergencyHotline,
    FeedbackType, Notification, NotificationFilter, NotificationType, ServiceUsage,
};
pub use tourism::{ProjectFilter, ProjectStatus, PublicProject, TouristSpot, TouristSpotQuery};
pub use user::{AuthResponse, LoginRequest, RegisterRequest, UpdateUserRequest, User};
