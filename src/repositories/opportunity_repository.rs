use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::opportunity::{Column, Entity as OpportunityEntity};
use crate::errors::ServiceError;
use crate::forecasting::{Opportunity, Stage};

/// Read access to opportunities, narrowed to the queries the analytics need.
///
/// Every query takes an optional owner: `Some` restricts results to that
/// sales rep's deals, `None` covers the whole book.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OpportunityStore: Send + Sync {
    /// Open opportunities expected to close within `[start, end]`.
    async fn open_closing_between(
        &self,
        owner_id: Option<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Opportunity>, ServiceError>;

    /// Converted opportunities with an actual close date within `[since, until]`.
    async fn converted_closed_between(
        &self,
        owner_id: Option<Uuid>,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Opportunity>, ServiceError>;

    async fn in_stages(
        &self,
        owner_id: Option<Uuid>,
        stages: &[Stage],
    ) -> Result<Vec<Opportunity>, ServiceError>;

    async fn created_since(
        &self,
        owner_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, ServiceError>;

    /// Mean amount across all opportunities, `None` when there are none.
    async fn average_amount(&self, owner_id: Option<Uuid>) -> Result<Option<Decimal>, ServiceError>;
}

/// SeaORM-backed store over the `opportunities` table
#[derive(Debug, Clone)]
pub struct SeaOrmOpportunityStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOpportunityStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn scoped(owner_id: Option<Uuid>) -> Select<OpportunityEntity> {
        let query = OpportunityEntity::find();
        match owner_id {
            Some(owner) => query.filter(Column::OwnerId.eq(owner)),
            None => query,
        }
    }

    async fn fetch(&self, query: Select<OpportunityEntity>) -> Result<Vec<Opportunity>, ServiceError> {
        let models = query.all(self.db.as_ref()).await?;
        Ok(models.into_iter().map(Opportunity::from).collect())
    }
}

#[async_trait]
impl OpportunityStore for SeaOrmOpportunityStore {
    async fn open_closing_between(
        &self,
        owner_id: Option<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let query = Self::scoped(owner_id)
            .filter(Column::Stage.is_in(Stage::OPEN))
            .filter(Column::ExpectedCloseDate.between(start, end))
            .order_by_asc(Column::ExpectedCloseDate)
            .order_by_asc(Column::CreatedAt);
        self.fetch(query).await
    }

    async fn converted_closed_between(
        &self,
        owner_id: Option<Uuid>,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let query = Self::scoped(owner_id)
            .filter(Column::Stage.eq(Stage::Converted))
            .filter(Column::ActualCloseDate.between(since, until))
            .order_by_asc(Column::ActualCloseDate);
        self.fetch(query).await
    }

    async fn in_stages(
        &self,
        owner_id: Option<Uuid>,
        stages: &[Stage],
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let query = Self::scoped(owner_id)
            .filter(Column::Stage.is_in(stages.iter().copied()))
            .order_by_asc(Column::CreatedAt);
        self.fetch(query).await
    }

    async fn created_since(
        &self,
        owner_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let query = Self::scoped(owner_id)
            .filter(Column::CreatedAt.gte(since))
            .order_by_asc(Column::CreatedAt);
        self.fetch(query).await
    }

    async fn average_amount(&self, owner_id: Option<Uuid>) -> Result<Option<Decimal>, ServiceError> {
        let query = Self::scoped(owner_id).select_only();

        // SQLite has no exact decimal type, so its SUM would round through floats.
        if self.db.get_database_backend() == DbBackend::Sqlite {
            let amounts: Vec<Decimal> = query
                .column(Column::Amount)
                .into_tuple()
                .all(self.db.as_ref())
                .await?;
            return Ok(mean(&amounts));
        }

        let totals = query
            .column_as(Expr::col(Column::Amount).sum(), "total_amount")
            .column_as(Expr::col(Column::Id).count(), "total_count")
            .into_tuple::<(Option<Decimal>, Option<i64>)>()
            .one(self.db.as_ref())
            .await?;

        Ok(match totals {
            Some((Some(total), Some(count))) if count > 0 => Some(total / Decimal::from(count)),
            _ => None,
        })
    }
}

fn mean(amounts: &[Decimal]) -> Option<Decimal> {
    if amounts.is_empty() {
        return None;
    }
    let total: Decimal = amounts.iter().sum();
    Some(total / Decimal::from(amounts.len()))
}

/// Store backed by a plain vector, for tests and local demos
#[derive(Debug, Default)]
pub struct InMemoryOpportunityStore {
    opportunities: RwLock<Vec<Opportunity>>,
}

impl InMemoryOpportunityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opportunities(opportunities: Vec<Opportunity>) -> Self {
        Self {
            opportunities: RwLock::new(opportunities),
        }
    }

    pub async fn insert(&self, opportunity: Opportunity) {
        self.opportunities.write().await.push(opportunity);
    }

    async fn matching<F>(&self, owner_id: Option<Uuid>, predicate: F) -> Vec<Opportunity>
    where
        F: Fn(&Opportunity) -> bool,
    {
        self.opportunities
            .read()
            .await
            .iter()
            .filter(|o| owner_id.map_or(true, |owner| o.owner_id == Some(owner)))
            .filter(|o| predicate(o))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OpportunityStore for InMemoryOpportunityStore {
    async fn open_closing_between(
        &self,
        owner_id: Option<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let mut found = self
            .matching(owner_id, |o| o.is_open() && o.expected_close_within(start, end))
            .await;
        found.sort_by_key(|o| (o.expected_close_date, o.created_at));
        Ok(found)
    }

    async fn converted_closed_between(
        &self,
        owner_id: Option<Uuid>,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let mut found = self
            .matching(owner_id, |o| {
                o.is_won()
                    && o.actual_close_date
                        .is_some_and(|closed| closed >= since && closed <= until)
            })
            .await;
        found.sort_by_key(|o| o.actual_close_date);
        Ok(found)
    }

    async fn in_stages(
        &self,
        owner_id: Option<Uuid>,
        stages: &[Stage],
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let mut found = self.matching(owner_id, |o| stages.contains(&o.stage)).await;
        found.sort_by_key(|o| o.created_at);
        Ok(found)
    }

    async fn created_since(
        &self,
        owner_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        let mut found = self.matching(owner_id, |o| o.created_at >= since).await;
        found.sort_by_key(|o| o.created_at);
        Ok(found)
    }

    async fn average_amount(&self, owner_id: Option<Uuid>) -> Result<Option<Decimal>, ServiceError> {
        let amounts: Vec<Decimal> = self
            .matching(owner_id, |_| true)
            .await
            .into_iter()
            .map(|o| o.amount)
            .collect();
        Ok(mean(&amounts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(8, 30, 0).unwrap().and_utc()
    }

    #[tokio::test]
    async fn in_memory_filters_by_owner() {
        let alice = Uuid::new_v4();
        let store = InMemoryOpportunityStore::new();
        store
            .insert(Opportunity::new("A", dec!(1000), 50, Stage::Qualification, at(d(2025, 1, 1))).owned_by(alice))
            .await;
        store
            .insert(Opportunity::new("B", dec!(3000), 50, Stage::Qualification, at(d(2025, 1, 2))))
            .await;

        let mine = store.in_stages(Some(alice), &Stage::OPEN).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "A");

        let everyone = store.in_stages(None, &Stage::OPEN).await.unwrap();
        assert_eq!(everyone.len(), 2);

        assert_eq!(store.average_amount(None).await.unwrap(), Some(dec!(2000)));
        assert_eq!(store.average_amount(Some(alice)).await.unwrap(), Some(dec!(1000)));
        assert_eq!(store.average_amount(Some(Uuid::new_v4())).await.unwrap(), None);
    }

    #[test]
    fn mean_of_amounts() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[dec!(1000), dec!(2500)]), Some(dec!(1750)));
        assert_eq!(mean(&[dec!(10), dec!(10), dec!(11)]).map(|m| m.round_dp(2)), Some(dec!(10.33)));
    }

    #[tokio::test]
    async fn in_memory_open_closing_between_skips_closed_and_undated() {
        let created = at(d(2025, 1, 1));
        let store = InMemoryOpportunityStore::with_opportunities(vec![
            Opportunity::new("late", dec!(10), 50, Stage::Negotiation, created).closing_on(d(2025, 3, 31)),
            Opportunity::new("early", dec!(10), 50, Stage::New, created).closing_on(d(2025, 2, 1)),
            Opportunity::new("won", dec!(10), 100, Stage::Converted, created).closing_on(d(2025, 2, 1)),
            Opportunity::new("undated", dec!(10), 50, Stage::New, created),
            Opportunity::new("outside", dec!(10), 50, Stage::New, created).closing_on(d(2025, 4, 1)),
        ]);

        let found = store
            .open_closing_between(None, d(2025, 2, 1), d(2025, 3, 31))
            .await
            .unwrap();
        let titles: Vec<&str> = found.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn in_memory_converted_closed_between_is_inclusive() {
        let created = at(d(2024, 6, 1));
        let store = InMemoryOpportunityStore::with_opportunities(vec![
            Opportunity::new("edge", dec!(10), 100, Stage::Converted, created).closed_on(d(2025, 1, 15)),
            Opportunity::new("old", dec!(10), 100, Stage::Converted, created).closed_on(d(2025, 1, 14)),
            Opportunity::new("lost", dec!(10), 0, Stage::Lost, created).closed_on(d(2025, 2, 1)),
            Opportunity::new("today", dec!(10), 100, Stage::Converted, created).closed_on(d(2025, 3, 1)),
            Opportunity::new("future", dec!(10), 100, Stage::Converted, created).closed_on(d(2025, 3, 2)),
        ]);

        let found = store
            .converted_closed_between(None, d(2025, 1, 15), d(2025, 3, 1))
            .await
            .unwrap();
        let titles: Vec<&str> = found.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["edge", "today"]);
    }
}
