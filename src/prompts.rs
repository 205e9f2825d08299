use crate::models::{AnalyzeRequest, BusinessContext, GenerateVideoRequest, Slide};

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn build_analysis_prompt(input: &AnalyzeRequest) -> String {
    let city = &input.location_city;
    let mut prompt = format!(
        "I want to start a business named {} near {} in {}. Give me the top 3 competitors in {}; \
if there is no competitor in {} then I need nearby regions. The idea is {}.",
        input.business_name, city, input.country, city, city, input.raw_idea
    );

    let extra: Vec<String> = [
        ("Problem being solved", &input.problem),
        ("Target audience", &input.target_audience),
        ("Budget", &input.budget),
        ("Business type", &input.business_type),
        ("Stage of the idea", &input.stage_of_idea),
        ("Founder time commitment", &input.time_commitment),
        ("Planning horizon", &input.time_horizon),
        ("Additional context from file", &input.file_content),
        ("Visual context", &input.photos_description),
    ]
    .into_iter()
    .filter_map(|(label, value)| present(value).map(|v| format!("- {label}: {v}")))
    .collect();

    if !extra.is_empty() {
        prompt.push_str("\n\nAdditional information:\n");
        prompt.push_str(&extra.join("\n"));
    }

    prompt.push_str(&format!(
        r#"

You MUST respond with a valid JSON object (no markdown, no code blocks) with exactly this structure:

{{
  "competing_players": [
    {{
      "name": "Competitor Name",
      "description": "One short sentence (max 15 words).",
      "location": "Address or area in {city}",
      "url": "https://website-if-known-else-empty-string",
      "strengths": ["strength1", "strength2"],
      "annual_revenue": "Estimate if known, else empty string",
      "year_established": "Year if known, else empty string"
    }}
  ],
  "market_cap_or_target_revenue": "Estimated market cap or target revenue for this business in the region",
  "major_vicinity_locations": ["Location 1", "Location 2", "Location 3"],
  "target_audience": ["Audience segment 1", "Audience segment 2", "Audience segment 3"],
  "undiscovered_addons": ["Add-on idea 1", "Add-on idea 2", "Add-on idea 3"],
  "suggested_business_name": "A short, memorable name for this business"
}}

Instructions:
1. competing_players: top 3 competitors in {city}. If fewer than 3 exist in the city, include competitors from nearby regions. Short description (max 15 words), location, url (empty string if unknown) and 1-3 strength tags.
2. market_cap_or_target_revenue: one sentence estimate for this business type in the region.
3. major_vicinity_locations: 3-5 locations near {city} (neighborhoods, districts, landmarks).
4. target_audience: 3-5 audience segments (short labels).
5. undiscovered_addons: 3-5 add-on ideas (short phrases).
6. suggested_business_name: only if the given name is generic or "{default}", otherwise repeat the given name.

Respond ONLY with the JSON object, no additional text before or after."#,
        default = crate::models::DEFAULT_BUSINESS_NAME,
    ));

    prompt
}

fn context_block(context: &BusinessContext) -> String {
    let mut lines = vec![
        format!("- Business name: {}", context.business_name),
        format!("- Location: {}, {}", context.location_city, context.country),
        format!("- Idea: {}", context.raw_idea),
    ];
    let optional = [
        ("Problem", &context.problem),
        ("Target audience", &context.target_audience),
        ("Budget", &context.budget),
        ("Business type", &context.business_type),
        ("Stage of the idea", &context.stage_of_idea),
        ("Founder time commitment", &context.time_commitment),
        ("Planning horizon", &context.time_horizon),
        ("Market size / revenue estimate", &context.market_cap_or_target_revenue),
    ];
    lines.extend(
        optional
            .into_iter()
            .filter_map(|(label, value)| present(value).map(|v| format!("- {label}: {v}"))),
    );

    if !context.competing_players.is_empty() {
        let names: Vec<&str> = context.competing_players.iter().map(|p| p.name.as_str()).collect();
        lines.push(format!("- Competitors: {}", names.join(", ")));
    }
    if !context.undiscovered_addons.is_empty() {
        lines.push(format!(
            "- Untapped add-on opportunities: {}",
            context.undiscovered_addons.join(", ")
        ));
    }
    lines.join("\n")
}

fn tone_and_language(context: &BusinessContext) -> String {
    let tone = present(&context.output_tone).unwrap_or("confident and professional");
    let language = present(&context.language).unwrap_or("English");
    format!("Write in {language} with a {tone} tone.")
}

const DECK_SHAPE: &str = r#"{
  "presentation_title": "Title of the pitch",
  "generated_tagline": "One-line tagline",
  "total_duration_minutes": 5,
  "slides": [
    {
      "slide_number": 1,
      "title": "Slide title",
      "subtitle": "Optional subtitle",
      "content": ["Bullet 1", "Bullet 2", "Bullet 3"],
      "speaker_notes": "What the presenter says",
      "duration_seconds": 30,
      "image_search_query": "two or three words describing a fitting image"
    }
  ]
}"#;

pub fn build_deck_prompt(context: &BusinessContext, num_slides: u32, duration_minutes: u32) -> String {
    format!(
        r#"Create a pitch deck for this business:

{context}

Requirements:
- Exactly {num_slides} slides, numbered 1 to {num_slides}.
- The talk lasts {duration_minutes} minutes; slide durations (in seconds) must add up to about {total_seconds} seconds.
- Slide 1 is a title slide with the business name and tagline. The last slide is a clear call to action.
- Cover the problem, the solution, the market, competitors and how the business stands apart, the business model, and next steps.
- 2-4 short bullets per slide.
- {tone}

Respond ONLY with a JSON object of this shape:

{shape}"#,
        context = context_block(context),
        total_seconds = duration_minutes * 60,
        tone = tone_and_language(context),
        shape = DECK_SHAPE,
    )
}

pub fn build_edit_prompt(
    current: &[Slide],
    edit_request: &str,
    context: &BusinessContext,
) -> serde_json::Result<String> {
    let slides = serde_json::to_string_pretty(current)?;
    Ok(format!(
        r#"Here is the current pitch deck for this business:

{context}

Current slides (JSON):
{slides}

Apply this change request to the deck: "{edit_request}"

Rules:
- Return the COMPLETE updated deck, not only the changed slides.
- Keep slides the request does not mention unchanged.
- Number the slides from 1 without gaps.
- {tone}

Respond ONLY with a JSON object of this shape:

{shape}"#,
        context = context_block(context),
        edit_request = edit_request.trim(),
        tone = tone_and_language(context),
        shape = DECK_SHAPE,
    ))
}

pub fn build_video_prompt(request: &GenerateVideoRequest) -> String {
    let mut prompt = request.prompt.trim().to_string();

    let details: Vec<String> = [
        ("Business", &request.business_name),
        ("Idea", &request.raw_idea),
        ("Problem solved", &request.problem),
        ("Audience", &request.target_audience),
        ("City", &request.location_city),
        ("Country", &request.country),
    ]
    .into_iter()
    .filter_map(|(label, value)| present(value).map(|v| format!("{label}: {v}")))
    .collect();

    if !details.is_empty() {
        prompt.push_str("\n\nContext for the promotional clip. ");
        prompt.push_str(&details.join(". "));
        prompt.push('.');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompetingPlayer;

    fn input() -> AnalyzeRequest {
        AnalyzeRequest {
            business_name: "Test Cafe".to_string(),
            location_city: "Bangalore".to_string(),
            country: "India".to_string(),
            target_audience: None,
            budget: None,
            business_type: None,
            raw_idea: "Specialty coffee shop".to_string(),
            problem: None,
            file_content: None,
            photos_description: None,
            model_selection: "chatgpt-latest".to_string(),
            time_commitment: None,
            output_tone: None,
            language: None,
            stage_of_idea: None,
            time_horizon: None,
        }
    }

    #[test]
    fn analysis_prompt_names_business_and_city() {
        let prompt = build_analysis_prompt(&input());
        assert!(prompt.contains("named Test Cafe near Bangalore in India"));
        assert!(prompt.contains("The idea is Specialty coffee shop."));
        assert!(prompt.contains("\"competing_players\""));
        assert!(!prompt.contains("Additional information"));
    }

    #[test]
    fn analysis_prompt_includes_optional_context() {
        let mut input = input();
        input.problem = Some("Limited options".to_string());
        input.budget = Some("  ".to_string());
        input.file_content = Some("Market research notes".to_string());

        let prompt = build_analysis_prompt(&input);
        assert!(prompt.contains("Additional information:"));
        assert!(prompt.contains("- Problem being solved: Limited options"));
        assert!(prompt.contains("- Additional context from file: Market research notes"));
        assert!(!prompt.contains("Budget:"));
    }

    #[test]
    fn deck_prompt_carries_counts_and_research() {
        let context = BusinessContext {
            business_name: "Pain Paris".to_string(),
            location_city: "Paris".to_string(),
            country: "France".to_string(),
            raw_idea: "organic bakery".to_string(),
            output_tone: Some("playful".to_string()),
            competing_players: vec![CompetingPlayer {
                name: "Poilane".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let prompt = build_deck_prompt(&context, 10, 5);
        assert!(prompt.contains("Exactly 10 slides"));
        assert!(prompt.contains("300 seconds"));
        assert!(prompt.contains("- Competitors: Poilane"));
        assert!(prompt.contains("playful tone"));
    }

    #[test]
    fn edit_prompt_embeds_current_slides() {
        let slides = vec![Slide {
            slide_number: 1,
            title: "Hello".to_string(),
            ..Default::default()
        }];
        let prompt = build_edit_prompt(&slides, " make it shorter ", &BusinessContext::default()).unwrap();
        assert!(prompt.contains("\"title\": \"Hello\""));
        assert!(prompt.contains("\"make it shorter\""));
    }

    #[test]
    fn video_prompt_appends_known_details() {
        let request = GenerateVideoRequest {
            time: 0.1,
            prompt: "Warm morning shots".to_string(),
            business_name: Some("Pain Paris".to_string()),
            raw_idea: None,
            problem: None,
            target_audience: None,
            location_city: Some("Paris".to_string()),
            country: None,
        };
        let prompt = build_video_prompt(&request);
        assert!(prompt.starts_with("Warm morning shots"));
        assert!(prompt.contains("Business: Pain Paris. City: Paris."));
    }
}
