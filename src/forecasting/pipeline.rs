use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{opportunity::Opportunity, stage::Stage};

/// Open-pipeline snapshot for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageBucket {
    pub stage: Stage,
    pub label: String,
    /// Default stage probability used for `weighted_value`.
    pub probability: u8,
    pub count: u32,
    #[schema(value_type = String)]
    pub total_value: Decimal,
    #[schema(value_type = String)]
    pub weighted_value: Decimal,
    #[schema(value_type = String)]
    pub average_value: Decimal,
    pub average_days_in_stage: f64,
}

/// One bucket per open stage, always all four and always in pipeline order.
pub fn analyze_pipeline(opportunities: &[Opportunity], now: DateTime<Utc>) -> Vec<StageBucket> {
    Stage::OPEN
        .iter()
        .map(|&stage| bucket_for(stage, opportunities, now))
        .collect()
}

fn bucket_for(stage: Stage, opportunities: &[Opportunity], now: DateTime<Utc>) -> StageBucket {
    let in_stage: Vec<&Opportunity> = opportunities.iter().filter(|o| o.stage == stage).collect();
    let count = in_stage.len() as u32;
    let total_value: Decimal = in_stage.iter().map(|o| o.amount).sum();
    let probability = stage.default_probability();

    let average_value = if count > 0 {
        (total_value / Decimal::from(count)).round_dp(2)
    } else {
        Decimal::ZERO
    };

    let average_days_in_stage = if count > 0 {
        let days: i64 = in_stage
            .iter()
            .map(|o| (now - o.updated_at).num_days().max(0))
            .sum();
        round_one(days as f64 / count as f64)
    } else {
        0.0
    };

    StageBucket {
        stage,
        label: stage.label().to_string(),
        probability,
        count,
        total_value,
        weighted_value: total_value * Decimal::from(probability) / Decimal::ONE_HUNDRED,
        average_value,
        average_days_in_stage,
    }
}

pub(crate) fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 10, 16)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn empty_input_still_yields_four_ordered_buckets() {
        let buckets = analyze_pipeline(&[], now());
        let stages: Vec<Stage> = buckets.iter().map(|b| b.stage).collect();
        assert_eq!(stages, Stage::OPEN.to_vec());
        for bucket in &buckets {
            assert_eq!(bucket.count, 0);
            assert!(bucket.total_value.is_zero());
            assert!(bucket.average_value.is_zero());
            assert_eq!(bucket.average_days_in_stage, 0.0);
        }
    }

    #[test]
    fn aggregates_values_and_days() {
        let created = now() - Duration::days(60);
        let opps = vec![
            Opportunity::new("a", dec!(1000), 30, Stage::ProposalSent, created)
                .touched_at(now() - Duration::days(10)),
            Opportunity::new("b", dec!(3000), 40, Stage::ProposalSent, created)
                .touched_at(now() - Duration::days(5)),
            Opportunity::new("c", dec!(700), 10, Stage::New, created).touched_at(now()),
            Opportunity::new("won", dec!(9000), 100, Stage::Converted, created),
        ];
        let buckets = analyze_pipeline(&opps, now());

        let proposal = &buckets[2];
        assert_eq!(proposal.stage, Stage::ProposalSent);
        assert_eq!(proposal.count, 2);
        assert_eq!(proposal.total_value, dec!(4000));
        assert_eq!(proposal.weighted_value, dec!(2000));
        assert_eq!(proposal.average_value, dec!(2000));
        assert_eq!(proposal.average_days_in_stage, 7.5);

        let new = &buckets[0];
        assert_eq!(new.count, 1);
        assert_eq!(new.weighted_value, dec!(70));
        assert_eq!(new.average_days_in_stage, 0.0);

        let counted: u32 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(counted, 3);
    }

    #[test]
    fn future_updates_do_not_go_negative() {
        let opps = vec![Opportunity::new("x", dec!(10), 10, Stage::Negotiation, now())
            .touched_at(now() + Duration::days(3))];
        let buckets = analyze_pipeline(&opps, now());
        assert_eq!(buckets[3].average_days_in_stage, 0.0);
    }
}
