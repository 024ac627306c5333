//! Visits repository

use chrono::NaiveDate;
use sqlx::PgConnection;

use crate::{
    error::AppResult,
    models::{
        visit::{NewVisit, Visit},
        VisitStatus,
    },
};

pub struct VisitsRepository;

impl VisitsRepository {
    pub async fn insert(conn: &mut PgConnection, visit: &NewVisit) -> AppResult<Visit> {
        let row = sqlx::query_as::<_, Visit>(
            r#"
            INSERT INTO visits (
                visitor_id, ticket_id, check_in_time, check_in_method, staff_id, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(visit.visitor_id)
        .bind(visit.ticket_id)
        .bind(visit.check_in_time)
        .bind(visit.check_in_method)
        .bind(visit.staff_id)
        .bind(VisitStatus::CheckedIn)
        .bind(&visit.notes)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    /// Visits checked in on `day` that have not checked out yet
    pub async fn count_open_on(
        conn: &mut PgConnection,
        day: NaiveDate,
        excluding_visit: i32,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM visits
            WHERE (check_in_time AT TIME ZONE 'UTC')::date = $1
              AND check_out_time IS NULL
              AND id <> $2
            "#,
        )
        .bind(day)
        .bind(excluding_visit)
        .fetch_one(conn)
        .await?;
        Ok(count)
    }
}
