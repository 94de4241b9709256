//! [`knowledge_core::job_store::JobStore`] persistence.

use knowledge_core::types::{
    JobMetadata, JobResultPayload, JobStage, JobStatus, JobType, ProcessingJob,
};
use knowledge_core::Error;
use libsql::{Connection, Row};
use uuid::Uuid;

use crate::convert::{enum_to_text, get_optional_timestamp, get_timestamp, text_to_enum};

pub(crate) fn row_to_job(row: &Row) -> knowledge_core::Result<ProcessingJob> {
    let id_str: String = row.get(0).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let job_type_str: String = row.get(1).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let parent_id_str: Option<String> =
        row.get(2).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let stage_str: Option<String> = row.get(3).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let text: String = row.get(4).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let metadata_str: String = row.get(5).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let status_str: String = row.get(6).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let progress: i64 = row.get(7).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let result_str: Option<String> =
        row.get(8).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let error_message: Option<String> =
        row.get(9).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let created_at = get_timestamp(row, 10)?;
    let started_at = get_optional_timestamp(row, 11)?;
    let completed_at = get_optional_timestamp(row, 12)?;

    Ok(ProcessingJob {
        id: Uuid::parse_str(&id_str).map_err(|e| Error::DatabaseError(e.to_string()))?,
        job_type: text_to_enum::<JobType>(&job_type_str)?,
        parent_job_id: parent_id_str
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::DatabaseError(e.to_string()))?,
        stage: stage_str.map(|s| text_to_enum::<JobStage>(&s)).transpose()?,
        text,
        metadata: serde_json::from_str::<JobMetadata>(&metadata_str).map_err(Error::Serialization)?,
        status: text_to_enum::<JobStatus>(&status_str)?,
        progress: u8::try_from(progress).unwrap_or(100),
        result: result_str
            .map(|s| serde_json::from_str::<JobResultPayload>(&s))
            .transpose()
            .map_err(Error::Serialization)?,
        error_message,
        created_at,
        started_at,
        completed_at,
    })
}

const SELECT_JOB_COLUMNS: &str = "id, job_type, parent_job_id, stage, text, metadata, status, \
     progress, result, error_message, created_at, started_at, completed_at";

pub(crate) async fn create_job(conn: &Connection, job: &ProcessingJob) -> knowledge_core::Result<()> {
    let sql = format!(
        "INSERT INTO jobs ({SELECT_JOB_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    conn.execute(&sql, libsql::params_from_iter(params_for_job(job)?))
        .await
        .map_err(|e| Error::DatabaseError(format!("failed to insert job: {e}")))?;
    Ok(())
}

pub(crate) async fn try_create_child(
    conn: &Connection,
    job: &ProcessingJob,
) -> knowledge_core::Result<bool> {
    let Some(parent_id) = job.parent_job_id else {
        return Err(Error::InvalidInput("child job must set parent_job_id".into()));
    };
    let Some(stage) = job.stage else {
        return Err(Error::InvalidInput("child job must set stage".into()));
    };

    let mut rows = conn
        .query(
            "SELECT id FROM jobs WHERE parent_job_id = ? AND stage = ?",
            libsql::params![parent_id.to_string(), enum_to_text(&stage)?],
        )
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    if rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
        .is_some()
    {
        return Ok(false);
    }

    create_job(conn, job).await?;
    Ok(true)
}

pub(crate) async fn get_job(
    conn: &Connection,
    id: Uuid,
) -> knowledge_core::Result<Option<ProcessingJob>> {
    let sql = format!("SELECT {SELECT_JOB_COLUMNS} FROM jobs WHERE id = ?");
    let mut rows = conn
        .query(&sql, libsql::params![id.to_string()])
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    match rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        Some(row) => Ok(Some(row_to_job(&row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn update_job(conn: &Connection, job: &ProcessingJob) -> knowledge_core::Result<()> {
    let sql = r#"
        UPDATE jobs SET
            job_type = ?, parent_job_id = ?, stage = ?, text = ?, metadata = ?,
            status = ?, progress = ?, result = ?, error_message = ?,
            created_at = ?, started_at = ?, completed_at = ?
        WHERE id = ?
    "#;
    let mut p = params_for_job(job)?;
    // Reorder: drop the leading `id` param (position 0) and append it for
    // the trailing WHERE clause instead.
    let id_param = p.remove(0);
    p.push(id_param);
    conn.execute(sql, libsql::params_from_iter(p))
        .await
        .map_err(|e| Error::DatabaseError(format!("failed to update job: {e}")))?;
    Ok(())
}

pub(crate) async fn get_job_by_stage(
    conn: &Connection,
    parent_id: Uuid,
    stage: JobStage,
) -> knowledge_core::Result<Option<ProcessingJob>> {
    let sql = format!("SELECT {SELECT_JOB_COLUMNS} FROM jobs WHERE parent_job_id = ? AND stage = ?");
    let mut rows = conn
        .query(
            &sql,
            libsql::params![parent_id.to_string(), enum_to_text(&stage)?],
        )
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    match rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        Some(row) => Ok(Some(row_to_job(&row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn get_children(
    conn: &Connection,
    parent_id: Uuid,
) -> knowledge_core::Result<Vec<ProcessingJob>> {
    let sql = format!("SELECT {SELECT_JOB_COLUMNS} FROM jobs WHERE parent_job_id = ?");
    let mut rows = conn
        .query(&sql, libsql::params![parent_id.to_string()])
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut children = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        children.push(row_to_job(&row)?);
    }
    Ok(children)
}

fn params_for_job(job: &ProcessingJob) -> knowledge_core::Result<Vec<libsql::Value>> {
    let metadata_json = serde_json::to_string(&job.metadata).map_err(Error::Serialization)?;
    let result_json = job
        .result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Error::Serialization)?;

    Ok(vec![
        libsql::Value::Text(job.id.to_string()),
        libsql::Value::Text(enum_to_text(&job.job_type)?),
        job.parent_job_id
            .map(|p| libsql::Value::Text(p.to_string()))
            .unwrap_or(libsql::Value::Null),
        job.stage
            .map(|s| enum_to_text(&s).map(libsql::Value::Text))
            .transpose()?
            .unwrap_or(libsql::Value::Null),
        libsql::Value::Text(job.text.clone()),
        libsql::Value::Text(metadata_json),
        libsql::Value::Text(enum_to_text(&job.status)?),
        libsql::Value::Integer(i64::from(job.progress)),
        result_json.map_or(libsql::Value::Null, libsql::Value::Text),
        job.error_message
            .clone()
            .map_or(libsql::Value::Null, libsql::Value::Text),
        libsql::Value::Integer(job.created_at.timestamp()),
        job.started_at
            .map(|t| libsql::Value::Integer(t.timestamp()))
            .unwrap_or(libsql::Value::Null),
        job.completed_at
            .map(|t| libsql::Value::Integer(t.timestamp()))
            .unwrap_or(libsql::Value::Null),
    ])
}
