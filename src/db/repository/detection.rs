use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::Severity;
use crate::models::DetectionRecord;

const SELECT_COLUMNS: &str = "SELECT id, user_id, image_url, disease_name, confidence, severity,
     recommendations, created_at FROM disease_detections";

/// Raw row before enum/uuid/timestamp parsing.
struct DetectionRow {
    id: String,
    user_id: Option<String>,
    image_url: String,
    disease_name: String,
    confidence: f64,
    severity: String,
    recommendations: String,
    created_at: String,
}

pub fn insert_detection(conn: &Connection, record: &DetectionRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO disease_detections (id, user_id, image_url, disease_name, confidence,
         severity, recommendations, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id.to_string(),
            record.owner_id,
            record.image_ref,
            record.disease_name,
            record.confidence,
            record.severity.as_str(),
            record.recommendations,
            format_timestamp(&record.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_detection(conn: &Connection, id: &Uuid) -> Result<Option<DetectionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
    let result = stmt.query_row(params![id.to_string()], map_row);

    match result {
        Ok(row) => Ok(Some(detection_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Latest detections for one owner, newest first.
pub fn list_recent_detections(
    conn: &Connection,
    owner_id: &str,
    limit: u32,
) -> Result<Vec<DetectionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![owner_id, limit], map_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(detection_from_row(row?)?);
    }
    Ok(records)
}

pub fn count_detections(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM disease_detections", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DetectionRow> {
    Ok(DetectionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        image_url: row.get(2)?,
        disease_name: row.get(3)?,
        confidence: row.get(4)?,
        severity: row.get(5)?,
        recommendations: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn detection_from_row(row: DetectionRow) -> Result<DetectionRecord, DatabaseError> {
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidValue {
        field: "id".into(),
        value: row.id.clone(),
    })?;
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map_err(|_| DatabaseError::InvalidValue {
            field: "created_at".into(),
            value: row.created_at.clone(),
        })?
        .with_timezone(&Utc);

    Ok(DetectionRecord {
        id,
        owner_id: row.user_id,
        image_ref: row.image_url,
        disease_name: row.disease_name,
        confidence: row.confidence,
        severity: Severity::from_str(&row.severity)?,
        recommendations: row.recommendations,
        created_at,
    })
}

/// Fixed-width RFC 3339 so lexical order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
