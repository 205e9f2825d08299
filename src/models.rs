use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_BUSINESS_NAME: &str = "My Business";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub business_name: String,
    pub location_city: String,
    pub country: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub business_type: Option<String>,
    pub raw_idea: String,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub photos_description: Option<String>,
    pub model_selection: String,
    #[serde(default)]
    pub time_commitment: Option<String>,
    #[serde(default)]
    pub output_tone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stage_of_idea: Option<String>,
    #[serde(default)]
    pub time_horizon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetingPlayer {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub annual_revenue: Option<String>,
    #[serde(default)]
    pub year_established: Option<String>,
}

/// Market analysis returned by `/api/analyze`.
///
/// Every field carries a default so a partial payload still deserializes; the
/// results stage treats empty values as "not shown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub competing_players: Vec<CompetingPlayer>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub market_cap_or_target_revenue: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub major_vicinity_locations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_audience: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub undiscovered_addons: Vec<String>,
    #[serde(default)]
    pub disclaimer: Option<String>,
    #[serde(default)]
    pub suggested_business_name: Option<String>,
}

/// Carried-forward summary of the intake form plus AI-derived highlights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_name: String,
    #[serde(default)]
    pub location_city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub raw_idea: String,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub business_type: Option<String>,
    #[serde(default)]
    pub time_commitment: Option<String>,
    #[serde(default)]
    pub output_tone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stage_of_idea: Option<String>,
    #[serde(default)]
    pub time_horizon: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub competing_players: Vec<CompetingPlayer>,
    #[serde(default)]
    pub market_cap_or_target_revenue: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub undiscovered_addons: Vec<String>,
}

impl BusinessContext {
    /// Returns a new context carrying the three analysis fields the pitch
    /// generators use. `self` is left untouched.
    pub fn enriched_with(&self, analysis: &AnalysisResult) -> BusinessContext {
        let market = analysis.market_cap_or_target_revenue.trim();
        BusinessContext {
            competing_players: analysis.competing_players.clone(),
            market_cap_or_target_revenue: (!market.is_empty()).then(|| market.to_string()),
            undiscovered_addons: analysis.undiscovered_addons.clone(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub slide_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<String>,
    #[serde(default)]
    pub speaker_notes: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub image_search_query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationDeck {
    #[serde(default)]
    pub presentation_title: String,
    #[serde(default)]
    pub generated_tagline: Option<String>,
    #[serde(default)]
    pub total_duration_minutes: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slides: Vec<Slide>,
}

impl PresentationDeck {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratePresentationRequest {
    #[serde(flatten)]
    pub business_context: BusinessContext,
    pub num_slides: u32,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPresentationRequest {
    pub current_presentation: Vec<Slide>,
    pub edit_request: String,
    pub business_context: BusinessContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPresentationRequest {
    pub presentation: PresentationDeck,
    pub business_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoRequest {
    /// Requested length in minutes; fractional for sub-minute clips.
    pub time: f64,
    pub prompt: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub raw_idea: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoResponse {
    pub video_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVideo {
    pub video_url: String,
    pub prompt: String,
    pub duration_seconds: u32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub model_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Per-task timings collected by the server pipelines.
pub type TaskTimes = HashMap<String, u64>;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_analysis_payload_uses_defaults() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "competing_players": [{"name": "Boulangerie Lune", "strengths": null}],
            "market_cap_or_target_revenue": null
        }))
        .unwrap();

        assert_eq!(result.competing_players.len(), 1);
        assert!(result.competing_players[0].strengths.is_empty());
        assert!(result.market_cap_or_target_revenue.is_empty());
        assert!(result.disclaimer.is_none());
        assert!(result.suggested_business_name.is_none());
        assert!(result.target_audience.is_empty());
    }

    #[test]
    fn enriched_context_keeps_form_fields() {
        let context = BusinessContext {
            business_name: "Pain Paris".to_string(),
            location_city: "Paris".to_string(),
            country: "France".to_string(),
            raw_idea: "organic bakery".to_string(),
            ..Default::default()
        };
        let analysis = AnalysisResult {
            market_cap_or_target_revenue: "EUR 400k in year one".to_string(),
            undiscovered_addons: vec!["Sourdough classes".to_string()],
            competing_players: vec![CompetingPlayer {
                name: "Du Pain et des Idees".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let enriched = context.enriched_with(&analysis);

        assert_eq!(enriched.business_name, "Pain Paris");
        assert_eq!(enriched.raw_idea, "organic bakery");
        assert_eq!(
            enriched.market_cap_or_target_revenue.as_deref(),
            Some("EUR 400k in year one")
        );
        assert_eq!(enriched.undiscovered_addons, vec!["Sourdough classes"]);
        assert_eq!(enriched.competing_players.len(), 1);
        assert!(context.competing_players.is_empty());
    }

    #[test]
    fn generate_request_flattens_context() {
        let request = GeneratePresentationRequest {
            business_context: BusinessContext {
                business_name: "Pain Paris".to_string(),
                ..Default::default()
            },
            num_slides: 10,
            duration_minutes: 5,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["business_name"], "Pain Paris");
        assert_eq!(value["num_slides"], 10);
        assert_eq!(value["duration_minutes"], 5);
    }
}
