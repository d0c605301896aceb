use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sales pipeline stage of an opportunity.
///
/// This is the single source of truth for stage ordering, display labels and
/// the default win probability attached to each stage. Every analytics
/// component reads it from here.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "qualification")]
    Qualification,
    #[sea_orm(string_value = "proposal_sent")]
    ProposalSent,
    #[sea_orm(string_value = "negotiation")]
    Negotiation,
    #[sea_orm(string_value = "converted")]
    Converted,
    #[sea_orm(string_value = "lost")]
    Lost,
}

impl Stage {
    /// Non-terminal stages, in pipeline order.
    pub const OPEN: [Stage; 4] = [
        Stage::New,
        Stage::Qualification,
        Stage::ProposalSent,
        Stage::Negotiation,
    ];

    /// Forward progression used for conversion estimates. `Lost` is not part
    /// of the progression.
    pub const PROGRESSION: [Stage; 5] = [
        Stage::New,
        Stage::Qualification,
        Stage::ProposalSent,
        Stage::Negotiation,
        Stage::Converted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::New => "New",
            Stage::Qualification => "Qualification",
            Stage::ProposalSent => "Proposal Sent",
            Stage::Negotiation => "Negotiation",
            Stage::Converted => "Converted",
            Stage::Lost => "Lost",
        }
    }

    /// Default win probability (percent) for an opportunity sitting in this stage.
    pub fn default_probability(self) -> u8 {
        match self {
            Stage::New => 10,
            Stage::Qualification => 25,
            Stage::ProposalSent => 50,
            Stage::Negotiation => 75,
            Stage::Converted => 100,
            Stage::Lost => 0,
        }
    }

    pub fn is_open(self) -> bool {
        !matches!(self, Stage::Converted | Stage::Lost)
    }

    /// Position in [`Stage::PROGRESSION`], `None` for `Lost`.
    pub fn progression_index(self) -> Option<usize> {
        Stage::PROGRESSION.iter().position(|stage| *stage == self)
    }

    /// Stages at or beyond `self` in the progression.
    pub fn and_beyond(self) -> &'static [Stage] {
        match self.progression_index() {
            Some(idx) => &Stage::PROGRESSION[idx..],
            None => &[],
        }
    }
}
