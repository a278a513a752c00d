use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsCategory {
    Festival,
    Infrastructure,
    Health,
    Education,
    Environment,
    Culture,
    Technology,
    Sports,
    Government,
    Emergency,
}

impl NewsCategory {
    pub const ALL: [NewsCategory; 10] = [
        NewsCategory::Festival,
        NewsCategory::Infrastructure,
        NewsCategory::Health,
        NewsCategory::Education,
        NewsCategory::Environment,
        NewsCategory::Culture,
        NewsCategory::Technology,
        NewsCategory::Sports,
        NewsCategory::Government,
        NewsCategory::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::Festival => "Festival",
            NewsCategory::Infrastructure => "Infrastructure",
            NewsCategory::Health => "Health",
            NewsCategory::Education => "Education",
            NewsCategory::Environment => "Environment",
            NewsCategory::Culture => "Culture",
            NewsCategory::Technology => "Technology",
            NewsCategory::Sports => "Sports",
            NewsCategory::Government => "Government",
            NewsCategory::Emergency => "Emergency",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewsArticle {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub full_content: Option<String>,
    pub image_url: Option<String>,
    pub published_date: Option<String>,
    pub published_time: Option<String>,
    pub location: Option<String>,
    pub expected_attendees: Option<String>,
    /// Kept as text so unknown categories from newer servers still parse.
    pub category: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub is_trending: bool,
    pub view_count: u64,
}

impl NewsArticle {
    pub fn category(&self) -> Option<NewsCategory> {
        NewsCategory::parse(&self.category)
    }
}

/// Filter fields merged into every news page request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<NewsCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(NewsCategory::parse("festival"), Some(NewsCategory::Festival));
        assert_eq!(NewsCategory::parse(" Sports "), Some(NewsCategory::Sports));
        assert_eq!(NewsCategory::parse("weather"), None);
    }

    #[test]
    fn test_article_parses_with_missing_fields() {
        let json = r#"{"id":3,"title":"Town fiesta","summary":"Parade at 8AM","category":"Festival","isFeatured":true}"#;
        let article: NewsArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.category(), Some(NewsCategory::Festival));
        assert!(article.is_featured);
        assert!(article.tags.is_empty());
    }
}
