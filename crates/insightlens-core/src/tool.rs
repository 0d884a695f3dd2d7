//! Tool attribution: which backend analysis produced an answer.

use serde::{Deserialize, Serialize};

/// Backend analysis tools the assistant can pick from.
///
/// Identifiers the client doesn't know yet are kept verbatim in `Unknown` so
/// a new backend tool still gets a (generic) badge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tool {
    NpsLookup,
    BestWorstProducts,
    SentimentAnalysis,
    TrendAnalysis,
    ProductComparison,
    ReviewSummary,
    Unknown(String),
}

/// Display colors for tool badges, mapped to real colors by each front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeColor {
    Blue,
    Green,
    Magenta,
    Yellow,
    Cyan,
    Red,
    Neutral,
}

/// What a front-end needs to draw a tool badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolBadge {
    pub icon: &'static str,
    pub label: String,
    pub color: BadgeColor,
}

pub const GENERIC_ICON: &str = "🔧";

impl Tool {
    /// Parse the `tool_used` field of an answer.
    ///
    /// Returns `None` for a missing tool and for the literal `"none"`, which
    /// the backend sends when the model answered without calling a tool.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw {
            None | Some("none") => None,
            Some(id) => Some(Self::from_id(id)),
        }
    }

    pub fn from_id(id: &str) -> Self {
        match id {
            "get_nps" => Tool::NpsLookup,
            "get_best_worst_products" => Tool::BestWorstProducts,
            "get_product_sentiment" => Tool::SentimentAnalysis,
            "get_trend" => Tool::TrendAnalysis,
            "compare_products" => Tool::ProductComparison,
            "summarize_product_reviews" => Tool::ReviewSummary,
            other => Tool::Unknown(other.to_string()),
        }
    }

    /// The identifier the backend uses for this tool.
    pub fn as_str(&self) -> &str {
        match self {
            Tool::NpsLookup => "get_nps",
            Tool::BestWorstProducts => "get_best_worst_products",
            Tool::SentimentAnalysis => "get_product_sentiment",
            Tool::TrendAnalysis => "get_trend",
            Tool::ProductComparison => "compare_products",
            Tool::ReviewSummary => "summarize_product_reviews",
            Tool::Unknown(id) => id,
        }
    }

    pub fn all() -> Vec<Tool> {
        vec![
            Tool::NpsLookup,
            Tool::BestWorstProducts,
            Tool::SentimentAnalysis,
            Tool::TrendAnalysis,
            Tool::ProductComparison,
            Tool::ReviewSummary,
        ]
    }

    pub fn describe(&self) -> ToolBadge {
        let (icon, label, color) = match self {
            Tool::NpsLookup => ("📈", "NPS Lookup", BadgeColor::Blue),
            Tool::BestWorstProducts => ("🏆", "Best & Worst Products", BadgeColor::Yellow),
            Tool::SentimentAnalysis => ("💬", "Sentiment Analysis", BadgeColor::Green),
            Tool::TrendAnalysis => ("📉", "Trend Analysis", BadgeColor::Cyan),
            Tool::ProductComparison => ("⚖", "Product Comparison", BadgeColor::Magenta),
            Tool::ReviewSummary => ("📝", "Review Summary", BadgeColor::Red),
            Tool::Unknown(id) => {
                return ToolBadge {
                    icon: GENERIC_ICON,
                    label: id.clone(),
                    color: BadgeColor::Neutral,
                }
            }
        };
        ToolBadge {
            icon,
            label: label.to_string(),
            color,
        }
    }
}

/// Badge lookup straight from the wire value. `None` means "draw no badge".
pub fn describe(tool_id: Option<&str>) -> Option<ToolBadge> {
    Tool::parse(tool_id).map(|tool| tool.describe())
}

impl From<String> for Tool {
    fn from(id: String) -> Self {
        Tool::from_id(&id)
    }
}

impl From<Tool> for String {
    fn from(tool: Tool) -> Self {
        tool.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tools_have_registered_badges() {
        let badge = describe(Some("get_nps")).unwrap();
        assert_eq!(badge.label, "NPS Lookup");
        assert_eq!(badge.color, BadgeColor::Blue);

        for tool in Tool::all() {
            let badge = tool.describe();
            assert_ne!(badge.color, BadgeColor::Neutral);
            assert_ne!(badge.icon, GENERIC_ICON);
        }
    }

    #[test]
    fn test_none_and_missing_render_nothing() {
        assert!(describe(None).is_none());
        assert!(describe(Some("none")).is_none());
    }

    #[test]
    fn test_unknown_tool_falls_back_to_generic_badge() {
        let badge = describe(Some("forecast_sales")).unwrap();
        assert_eq!(badge.icon, GENERIC_ICON);
        assert_eq!(badge.label, "forecast_sales");
        assert_eq!(badge.color, BadgeColor::Neutral);
    }

    #[test]
    fn test_ids_survive_parse() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_id(tool.as_str()), tool);
        }
        assert_eq!(Tool::from_id("x").as_str(), "x");
    }

    #[test]
    fn test_serde_uses_backend_identifier() {
        let json = serde_json::to_string(&Tool::TrendAnalysis).unwrap();
        assert_eq!(json, "\"get_trend\"");
        let tool: Tool = serde_json::from_str("\"compare_products\"").unwrap();
        assert_eq!(tool, Tool::ProductComparison);
    }
}
