use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::analysis::{AnalysisRecord, NewAnalysisRecord};

/// Whether `subject_id` has no archived analysis yet.
///
/// Read-then-insert: two concurrent first analyses for the same subject can
/// both observe `true`.
pub async fn is_first_record_for_subject(
    pool: &PgPool,
    subject_id: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM gait_analysis_records WHERE subject_id = $1
        ) AS has_record
        "#,
    )
    .bind(subject_id)
    .fetch_one(pool)
    .await?;

    let has_record: bool = row.try_get("has_record")?;
    Ok(!has_record)
}

/// Insert an analysis record, returning its id
pub async fn insert_record(
    pool: &PgPool,
    record: &NewAnalysisRecord,
) -> Result<Uuid, sqlx::Error> {
    let notes = record.result.notes(record.is_baseline);

    let row = sqlx::query(
        r#"
        INSERT INTO gait_analysis_records (
            job_id, owner_id, subject_id, original_video_filename, video_url,
            stability_score, curvature_score, analysis_results, is_baseline, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(record.job_id)
    .bind(&record.owner_id)
    .bind(&record.subject_id)
    .bind(&record.original_video_filename)
    .bind(&record.video_url)
    .bind(i16::from(record.result.scores.stability))
    .bind(record.result.scores.curvature)
    .bind(Json(&record.result))
    .bind(record.is_baseline)
    .bind(notes)
    .fetch_one(pool)
    .await?;

    row.try_get("id")
}

/// Records for a subject, newest first (without the raw keypoint payload).
pub async fn list_records_for_subject(
    pool: &PgPool,
    subject_id: &str,
    limit: i64,
) -> Result<Vec<AnalysisRecord>, sqlx::Error> {
    sqlx::query_as::<_, AnalysisRecord>(
        r#"
        SELECT id, job_id, owner_id, subject_id, original_video_filename, video_url,
               stability_score, curvature_score, is_baseline, notes, created_at
        FROM gait_analysis_records
        WHERE subject_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(subject_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
