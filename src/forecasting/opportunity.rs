use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::ActiveValue::Set;

use super::stage::Stage;
use crate::entities::opportunity;

/// Read-only view of a sales opportunity as consumed by the analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub title: String,
    pub amount: Decimal,
    /// Likelihood of closing, percent in `0..=100`.
    pub probability: u8,
    pub stage: Stage,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    /// New opportunity created and last touched at `at`. Probability is
    /// clamped to 100.
    pub fn new(
        title: impl Into<String>,
        amount: Decimal,
        probability: u8,
        stage: Stage,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: None,
            title: title.into(),
            amount,
            probability: probability.min(100),
            stage,
            expected_close_date: None,
            actual_close_date: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn closing_on(mut self, date: NaiveDate) -> Self {
        self.expected_close_date = Some(date);
        self
    }

    pub fn closed_on(mut self, date: NaiveDate) -> Self {
        self.actual_close_date = Some(date);
        self
    }

    pub fn owned_by(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn touched_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    pub fn is_open(&self) -> bool {
        self.stage.is_open()
    }

    pub fn is_won(&self) -> bool {
        self.stage == Stage::Converted
    }

    pub fn expected_close_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.expected_close_date
            .map(|date| date >= start && date <= end)
            .unwrap_or(false)
    }
}

impl From<opportunity::Model> for Opportunity {
    fn from(model: opportunity::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            title: model.title,
            amount: model.amount,
            probability: model.probability.clamp(0, 100) as u8,
            stage: model.stage,
            expected_close_date: model.expected_close_date,
            actual_close_date: model.actual_close_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<Opportunity> for opportunity::ActiveModel {
    fn from(o: Opportunity) -> Self {
        Self {
            id: Set(o.id),
            owner_id: Set(o.owner_id),
            title: Set(o.title),
            amount: Set(o.amount),
            probability: Set(i32::from(o.probability)),
            stage: Set(o.stage),
            expected_close_date: Set(o.expected_close_date),
            actual_close_date: Set(o.actual_close_date),
            created_at: Set(o.created_at),
            updated_at: Set(o.updated_at),
        }
    }
}
