use std::fmt;
use std::str::FromStr;

use crate::models::{AnalysisResult, BusinessContext, CompetingPlayer};

/// One highlight card on the results screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Card {
    Revenue,
    Locations,
    Audience,
    Addons,
    /// Zero-based index into `competing_players`.
    Competitor(usize),
}

impl FromStr for Card {
    type Err = String;

    /// Accepts `revenue`, `locations`, `audience`, `addons` and
    /// `competitor-N` with N counted from 1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "revenue" => Ok(Card::Revenue),
            "locations" => Ok(Card::Locations),
            "audience" => Ok(Card::Audience),
            "addons" => Ok(Card::Addons),
            other => other
                .strip_prefix("competitor-")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .map(|n| Card::Competitor(n - 1))
                .ok_or_else(|| format!("Unknown card '{other}'")),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Card::Revenue => f.write_str("revenue"),
            Card::Locations => f.write_str("locations"),
            Card::Audience => f.write_str("audience"),
            Card::Addons => f.write_str("addons"),
            Card::Competitor(i) => write!(f, "competitor-{}", i + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub card: Card,
    pub title: String,
    pub summary: String,
    /// Only filled for the expanded card.
    pub detail: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub display_name: String,
    pub disclaimer: Option<String>,
    pub cards: Vec<CardView>,
}

impl ResultsView {
    pub fn expanded(&self) -> Option<&CardView> {
        self.cards.iter().find(|c| c.detail.is_some())
    }
}

pub struct ResultsStage {
    result: AnalysisResult,
    context: BusinessContext,
    expanded: Option<Card>,
}

impl ResultsStage {
    pub fn new(result: AnalysisResult, context: BusinessContext) -> Self {
        Self {
            result,
            context,
            expanded: None,
        }
    }

    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }

    pub fn context(&self) -> &BusinessContext {
        &self.context
    }

    pub fn expanded(&self) -> Option<Card> {
        self.expanded
    }

    /// Expands `card`, collapsing any other. Cards that would not be shown
    /// are ignored.
    pub fn expand(&mut self, card: Card) {
        if self.has_data(card) {
            self.expanded = Some(card);
        }
    }

    pub fn collapse(&mut self) {
        self.expanded = None;
    }

    fn has_data(&self, card: Card) -> bool {
        let r = &self.result;
        match card {
            Card::Revenue => !r.market_cap_or_target_revenue.trim().is_empty(),
            Card::Locations => !r.major_vicinity_locations.is_empty(),
            Card::Audience => !r.target_audience.is_empty(),
            Card::Addons => !r.undiscovered_addons.is_empty(),
            Card::Competitor(i) => i < r.competing_players.len(),
        }
    }

    pub fn render(&self) -> ResultsView {
        let r = &self.result;
        let mut cards = Vec::new();

        let mut push = |card: Card, title: String, summary: String, detail: Vec<String>| {
            if self.has_data(card) {
                cards.push(CardView {
                    card,
                    title,
                    summary,
                    detail: (self.expanded == Some(card)).then_some(detail),
                });
            }
        };

        push(
            Card::Revenue,
            "Market size / target revenue".to_string(),
            r.market_cap_or_target_revenue.trim().to_string(),
            vec![r.market_cap_or_target_revenue.trim().to_string()],
        );
        push(
            Card::Locations,
            "Nearby locations".to_string(),
            count_summary(&r.major_vicinity_locations, "location"),
            r.major_vicinity_locations.clone(),
        );
        push(
            Card::Audience,
            "Target audience".to_string(),
            count_summary(&r.target_audience, "segment"),
            r.target_audience.clone(),
        );
        push(
            Card::Addons,
            "Undiscovered add-ons".to_string(),
            count_summary(&r.undiscovered_addons, "idea"),
            r.undiscovered_addons.clone(),
        );
        for (i, player) in r.competing_players.iter().enumerate() {
            push(
                Card::Competitor(i),
                player.name.clone(),
                player.description.clone().unwrap_or_default(),
                competitor_detail(player),
            );
        }

        ResultsView {
            display_name: self.context.business_name.clone(),
            disclaimer: r.disclaimer.clone().filter(|d| !d.trim().is_empty()),
            cards,
        }
    }

    /// Context for the pitch stage: the form context plus competitors,
    /// market size and add-ons.
    pub fn proceed(&self) -> BusinessContext {
        self.context.enriched_with(&self.result)
    }
}

fn count_summary(items: &[String], noun: &str) -> String {
    match items {
        [only] => only.clone(),
        _ => format!("{} {}s", items.len(), noun),
    }
}

fn competitor_detail(player: &CompetingPlayer) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(description) = &player.description {
        lines.push(description.clone());
    }
    if let Some(location) = &player.location {
        lines.push(format!("Location: {location}"));
    }
    if let Some(url) = &player.url {
        lines.push(format!("Website: {url}"));
    }
    if let Some(revenue) = &player.annual_revenue {
        lines.push(format!("Annual revenue: {revenue}"));
    }
    if let Some(year) = &player.year_established {
        lines.push(format!("Established: {year}"));
    }
    lines.extend(player.strengths.iter().map(|s| format!("+ {s}")));
    lines
}
