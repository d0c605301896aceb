//! Stage-to-stage and overall conversion estimates over a creation window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{opportunity::Opportunity, pipeline::round_one, stage::Stage};

pub const DEFAULT_CONVERSION_WINDOW_MONTHS: u32 = 3;

const PLACEHOLDER_EDGE_TOTAL: u32 = 10;
const PLACEHOLDER_OVERALL_TOTAL: u32 = 20;
const PLACEHOLDER_OVERALL_WON: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversionEdge {
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub label: String,
    /// Percentage, one decimal.
    pub rate: f64,
    pub progressed: u32,
    pub total: u32,
    /// Placeholder figures were used because the window had no data.
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OverallConversion {
    pub rate: f64,
    pub won: u32,
    pub lost: u32,
    pub total: u32,
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversionRates {
    pub window_start: DateTime<Utc>,
    pub stages: Vec<ConversionEdge>,
    pub overall: OverallConversion,
}

fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_one(part as f64 / whole as f64 * 100.0)
}

/// Estimates conversion for each adjacent pair of the progression, counting
/// only opportunities created at or after `window_start`.
///
/// An opportunity counts as having progressed past `stage` when it currently
/// sits at the next stage or anywhere further along.
pub fn estimate_conversion_rates(
    opportunities: &[Opportunity],
    window_start: DateTime<Utc>,
) -> ConversionRates {
    let in_window: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|o| o.created_at >= window_start)
        .collect();

    let count_in = |stages: &[Stage]| -> u32 {
        in_window
            .iter()
            .filter(|o| stages.contains(&o.stage))
            .count() as u32
    };

    let stages = Stage::PROGRESSION
        .windows(2)
        .map(|pair| {
            let (from, to) = (pair[0], pair[1]);
            let current = count_in(&[from]);
            let beyond = count_in(to.and_beyond());
            let (progressed, total, estimated) = match current + beyond {
                0 => (placeholder_progressed(from), PLACEHOLDER_EDGE_TOTAL, true),
                total => (beyond, total, false),
            };
            ConversionEdge {
                from_stage: from,
                to_stage: to,
                label: format!("{} → {}", from.label(), to.label()),
                rate: percentage(progressed, total),
                progressed,
                total,
                estimated,
            }
        })
        .collect();

    ConversionRates {
        window_start,
        stages,
        overall: overall_conversion(&in_window),
    }
}

/// `round(10 × (100 − p) / 100)` with `p` the stage's default probability.
fn placeholder_progressed(stage: Stage) -> u32 {
    let remaining = 100 - u32::from(stage.default_probability());
    (PLACEHOLDER_EDGE_TOTAL as f64 * remaining as f64 / 100.0).round() as u32
}

fn overall_conversion(in_window: &[&Opportunity]) -> OverallConversion {
    if in_window.is_empty() {
        return OverallConversion {
            rate: percentage(PLACEHOLDER_OVERALL_WON, PLACEHOLDER_OVERALL_TOTAL),
            won: PLACEHOLDER_OVERALL_WON,
            lost: 0,
            total: PLACEHOLDER_OVERALL_TOTAL,
            estimated: true,
        };
    }

    let won = in_window.iter().filter(|o| o.stage == Stage::Converted).count() as u32;
    let lost = in_window.iter().filter(|o| o.stage == Stage::Lost).count() as u32;
    let total = match won + lost {
        0 => in_window.len() as u32,
        closed => closed,
    };

    OverallConversion {
        rate: percentage(won, total),
        won,
        lost,
        total,
        estimated: false,
    }
}
