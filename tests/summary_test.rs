mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockflow_api::{
    entities::Direction,
    errors::ServiceError,
    services::{
        inventory::AdjustStockRequest,
        reports::{RegenerateSummariesRequest, SummaryFilter},
    },
};

#[tokio::test]
async fn regenerated_days_chain_closing_into_opening() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("SUM-BOLT", dec!(0.5)).await;
    app.stock(bolt, main, dec!(10)).await;
    app.state
        .services
        .inventory
        .adjust(
            &app.admin,
            AdjustStockRequest {
                product_id: bolt,
                warehouse_id: main,
                direction: Direction::Out,
                quantity: dec!(3),
                notes: None,
            },
        )
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let from = today - Duration::days(2);
    let reports = &app.state.services.reports;
    let report = reports
        .regenerate_summaries(
            &app.admin,
            RegenerateSummariesRequest {
                from,
                to: today,
                product_id: Some(bolt),
                warehouse_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.keys, 1);
    assert_eq!(report.rows, 3);

    let rows = reports
        .summaries(
            &app.admin,
            SummaryFilter {
                product_id: Some(bolt),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].summary_date, from);
    assert_eq!(rows[0].opening_balance, Decimal::ZERO);

    for row in &rows {
        assert_eq!(row.closing_balance, row.opening_balance + row.total_in - row.total_out);
    }
    for pair in rows.windows(2) {
        assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
    }

    let last = rows.last().unwrap();
    assert_eq!(last.summary_date, today);
    assert_eq!(last.total_in, dec!(10));
    assert_eq!(last.total_out, dec!(3));
    assert_eq!(last.closing_balance, dec!(7));
    assert_eq!(last.adjustment_count, 2);
    assert_eq!(last.closing_balance, app.balance(bolt, main).await);
}

#[tokio::test]
async fn regenerating_twice_replaces_rather_than_duplicates() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("SUM-NUT", dec!(0.5)).await;
    app.stock(bolt, main, dec!(4)).await;

    let today = Utc::now().date_naive();
    let request = RegenerateSummariesRequest {
        from: today - Duration::days(1),
        to: today,
        product_id: None,
        warehouse_id: Some(main),
    };
    let reports = &app.state.services.reports;
    let first = reports
        .regenerate_summaries(&app.admin, request.clone())
        .await
        .unwrap();
    let second = reports
        .regenerate_summaries(&app.admin, request)
        .await
        .unwrap();
    assert_eq!(first, second);

    let rows = reports
        .summaries(&app.admin, SummaryFilter::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), second.rows);
}

#[tokio::test]
async fn keys_without_history_produce_no_rows() {
    let app = TestApp::new().await;
    app.create_product("SUM-IDLE", dec!(1)).await;

    let today = Utc::now().date_naive();
    let report = app
        .state
        .services
        .reports
        .regenerate_summaries(
            &app.admin,
            RegenerateSummariesRequest {
                from: today,
                to: today,
                product_id: None,
                warehouse_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.rows, 0);
}

#[tokio::test]
async fn inverted_range_is_invalid() {
    let app = TestApp::new().await;
    let today = Utc::now().date_naive();

    let err = app
        .state
        .services
        .reports
        .regenerate_summaries(
            &app.admin,
            RegenerateSummariesRequest {
                from: today,
                to: today - Duration::days(1),
                product_id: None,
                warehouse_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn valuation_prices_current_balances() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let store = app.warehouse("STORE").await;
    let lamp = app.create_product("VAL-LAMP", dec!(12.5)).await;
    app.stock(lamp, main, dec!(4)).await;
    app.stock(lamp, store, dec!(2)).await;

    let reports = &app.state.services.reports;
    let all = reports.stock_valuation(&app.admin, None).await.unwrap();
    assert_eq!(all.lines.len(), 2);
    assert_eq!(all.total_value, dec!(75));

    let main_only = reports.stock_valuation(&app.admin, Some(main)).await.unwrap();
    assert_eq!(main_only.lines.len(), 1);
    assert_eq!(main_only.lines[0].sku, "VAL-LAMP");
    assert_eq!(main_only.total_value, dec!(50));
}
