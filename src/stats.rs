//! Dashboard statistics
//!
//! Computed on every request from the visits table and article counters;
//! nothing here is cached or persisted.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::{DailyVisits, Database, TopArticle};

/// Rolling window for the "this month" figure
const MONTHLY_WINDOW_DAYS: i64 = 30;
/// Calendar days shown on the chart, today included
const CHART_DAYS: i64 = 7;
const TOP_ARTICLES: i64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_visits: i64,
    pub monthly_visits: i64,
    pub chart_data: Vec<DailyVisits>,
    pub top_articles: Vec<TopArticle>,
}

/// Start of the first UTC day shown on the chart
fn chart_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first_day = (now - Duration::days(CHART_DAYS - 1)).date_naive();
    first_day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

/// Run the four dashboard queries concurrently. Any failure fails the whole call.
pub async fn dashboard(db: &Database, now: DateTime<Utc>) -> Result<DashboardStats> {
    let (total_visits, monthly_visits, chart_data, top_articles) = tokio::try_join!(
        db.count_visits(),
        db.count_visits_since(now - Duration::days(MONTHLY_WINDOW_DAYS)),
        db.visits_per_day(chart_start(now)),
        db.top_articles(TOP_ARTICLES)
    )?;

    Ok(DashboardStats {
        total_visits,
        monthly_visits,
        chart_data,
        top_articles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{memory_db, seed_article, visit_at};
    use chrono::TimeZone;

    #[test]
    fn chart_starts_at_midnight_six_days_back() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 42, 7).unwrap();
        assert_eq!(chart_start(now), Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_daily_series_only_covers_trailing_week() {
        let db = memory_db().await;
        let now = Utc::now();
        // d days ago gets d + 1 visits, for ten days
        for d in 0..10i64 {
            for _ in 0..=d {
                db.insert_visit(&visit_at(now - Duration::days(d))).await.unwrap();
            }
        }

        let stats = dashboard(&db, now).await.unwrap();

        let expected: Vec<DailyVisits> = (0..7i64)
            .rev()
            .map(|d| DailyVisits {
                date: (now - Duration::days(d)).format("%m-%d").to_string(),
                visits: d + 1,
            })
            .collect();
        assert_eq!(stats.chart_data, expected);
        assert_eq!(stats.total_visits, (1..=10).sum::<i64>());
        assert_eq!(stats.monthly_visits, stats.total_visits);
    }

    #[tokio::test]
    async fn test_days_without_visits_are_absent() {
        let db = memory_db().await;
        let now = Utc::now();
        db.insert_visit(&visit_at(now)).await.unwrap();
        db.insert_visit(&visit_at(now - Duration::days(3))).await.unwrap();

        let stats = dashboard(&db, now).await.unwrap();
        assert_eq!(stats.chart_data.len(), 2);
        assert_eq!(stats.chart_data[0].date, (now - Duration::days(3)).format("%m-%d").to_string());
    }

    #[tokio::test]
    async fn test_monthly_window_is_thirty_days() {
        let db = memory_db().await;
        let now = Utc::now();
        db.insert_visit(&visit_at(now - Duration::days(29))).await.unwrap();
        db.insert_visit(&visit_at(now - Duration::days(31))).await.unwrap();
        db.insert_visit(&visit_at(now - Duration::days(400))).await.unwrap();

        let stats = dashboard(&db, now).await.unwrap();
        assert_eq!(stats.total_visits, 3);
        assert_eq!(stats.monthly_visits, 1);
    }

    #[tokio::test]
    async fn test_top_five_articles() {
        let db = memory_db().await;
        for (i, views) in [5, 50, 1, 30, 10, 40, 20].into_iter().enumerate() {
            seed_article(&db, &format!("Post {}", i), views).await;
        }

        let stats = dashboard(&db, Utc::now()).await.unwrap();
        let views: Vec<i64> = stats.top_articles.iter().map(|a| a.views).collect();
        assert_eq!(views, vec![50, 40, 30, 20, 10]);
    }

    #[tokio::test]
    async fn test_fails_when_store_is_unavailable() {
        let db = memory_db().await;
        db.close().await;
        assert!(dashboard(&db, Utc::now()).await.is_err());
    }

    #[test]
    fn serializes_as_flat_camel_case_object() {
        let stats = DashboardStats {
            total_visits: 3,
            monthly_visits: 2,
            chart_data: vec![DailyVisits { date: "03-10".to_string(), visits: 2 }],
            top_articles: vec![],
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalVisits"], 3);
        assert_eq!(json["monthlyVisits"], 2);
        assert_eq!(json["chartData"][0]["date"], "03-10");
        assert_eq!(json["chartData"][0]["visits"], 2);
        assert!(json["topArticles"].as_array().unwrap().is_empty());
    }
}
