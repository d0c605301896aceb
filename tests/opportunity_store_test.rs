mod common;

use std::sync::Arc;

use pipeline_forecast::{
    db::{self, DbConfig},
    entities::opportunity,
    forecasting::{FixedClock, Opportunity, Stage},
    repositories::{OpportunityStore, SeaOrmOpportunityStore},
    services::{ForecastRequest, ForecastService},
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use uuid::Uuid;

use common::{at, date, open, test_config, today, won};

async fn migrated_pool() -> DatabaseConnection {
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&config).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

async fn insert_all(pool: &DatabaseConnection, opportunities: Vec<Opportunity>) {
    for record in opportunities {
        let model: opportunity::ActiveModel = record.into();
        model.insert(pool).await.unwrap();
    }
}

#[tokio::test]
async fn open_closing_between_filters_stage_and_dates() {
    let pool = migrated_pool().await;
    insert_all(
        &pool,
        vec![
            open("In range", dec!(1000), 60, Stage::ProposalSent, date(2025, 6, 3)),
            open("Too late", dec!(1000), 60, Stage::ProposalSent, date(2025, 7, 1)),
            won("Already won", dec!(1000), date(2025, 6, 3)).closing_on(date(2025, 6, 3)),
            Opportunity::new("Undated", dec!(1000), 60, Stage::New, at(today())),
        ],
    )
    .await;

    let store = SeaOrmOpportunityStore::new(Arc::new(pool));
    let found = store
        .open_closing_between(None, date(2025, 5, 1), date(2025, 6, 30))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "In range");
    assert_eq!(found[0].stage, Stage::ProposalSent);
    assert_eq!(found[0].amount, dec!(1000));
}

#[tokio::test]
async fn owner_scope_and_average_amount() {
    let pool = migrated_pool().await;
    let rep = Uuid::new_v4();
    insert_all(
        &pool,
        vec![
            open("Rep deal", dec!(3000), 25, Stage::Qualification, date(2025, 6, 1)).owned_by(rep),
            open("Other deal", dec!(1000), 25, Stage::Qualification, date(2025, 6, 1)),
        ],
    )
    .await;

    let store = SeaOrmOpportunityStore::new(Arc::new(pool));

    let scoped = store.in_stages(Some(rep), &Stage::OPEN).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].owner_id, Some(rep));

    assert_eq!(store.average_amount(None).await.unwrap(), Some(dec!(2000)));
    assert_eq!(store.average_amount(Some(rep)).await.unwrap(), Some(dec!(3000)));
    assert_eq!(store.average_amount(Some(Uuid::new_v4())).await.unwrap(), None);
}

#[tokio::test]
async fn converted_and_created_windows() {
    let pool = migrated_pool().await;
    insert_all(
        &pool,
        vec![
            won("Recent win", dec!(5000), date(2025, 4, 2)),
            won("Old win", dec!(5000), date(2024, 8, 2)),
            won("Future-dated win", dec!(7000), date(2025, 7, 3)),
        ],
    )
    .await;

    let store = SeaOrmOpportunityStore::new(Arc::new(pool));

    let recent = store
        .converted_closed_between(None, date(2024, 11, 20), today())
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].title, "Recent win");

    let created = store
        .created_since(None, at(date(2025, 1, 1)))
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
}

#[tokio::test]
async fn service_report_over_sqlite() {
    let pool = migrated_pool().await;
    insert_all(
        &pool,
        vec![
            open("Committed", dec!(10000), 90, Stage::Negotiation, date(2025, 5, 30)),
            won("Won", dec!(4000), date(2025, 3, 15)),
        ],
    )
    .await;

    let store = Arc::new(SeaOrmOpportunityStore::new(Arc::new(pool)));
    let service = ForecastService::new(
        store,
        Arc::new(FixedClock::on(today())),
        test_config().forecast,
    );

    let report = service.report(ForecastRequest::default()).await.unwrap();
    assert_eq!(report.forecasts.months[0].committed, dec!(10000));
    assert!(!report.historical_data.is_synthetic());
    assert_eq!(report.pipeline_analysis[3].count, 1);
    assert_eq!(report.conversion_rates.overall.won, 1);
}
