use diesel::prelude::*;
use diesel::result::Error as DieselError;

use crate::models::job_execution_history::{JobExecutionHistory, NewJobExecutionHistory, UpdateJobExecutionHistory};
use crate::schema::job_execution_history::dsl::*;

pub fn create(
    conn: &mut PgConnection,
    new_history: &NewJobExecutionHistory,
) -> Result<JobExecutionHistory, DieselError> {
    diesel::insert_into(job_execution_history)
        .values(new_history)
        .returning(JobExecutionHistory::as_returning())
        .get_result(conn)
}

pub fn find_by_id(
    conn: &mut PgConnection,
    history_id: i32,
) -> Result<Option<JobExecutionHistory>, DieselError> {
    job_execution_history
        .find(history_id)
        .select(JobExecutionHistory::as_select())
        .first(conn)
        .optional()
}

pub fn update(
    conn: &mut PgConnection,
    history_id: i32,
    update_data: &UpdateJobExecutionHistory,
) -> Result<JobExecutionHistory, DieselError> {
    diesel::update(job_execution_history.find(history_id))
        .set(update_data)
        .returning(JobExecutionHistory::as_returning())
        .get_result(conn)
}

pub fn find_latest_by_job_name(
    conn: &mut PgConnection,
    job_name_filter: &str,
) -> Result<Option<JobExecutionHistory>, DieselError> {
    job_execution_history
        .filter(job_name.eq(job_name_filter))
        .order(started_at.desc())
        .select(JobExecutionHistory::as_select())
        .first(conn)
        .optional()
}

/// Newest first. `page` starts at 1.
pub fn paginate(
    conn: &mut PgConnection,
    job_name_filter: Option<String>,
    status_filter: Option<String>,
    page: i64,
    page_size: i64,
) -> Result<(Vec<JobExecutionHistory>, i64), DieselError> {
    let offset = (page - 1) * page_size;

    let mut count_query = job_execution_history.into_boxed();
    let mut items_query = job_execution_history.into_boxed();

    if let Some(job_name_val) = job_name_filter {
        count_query = count_query.filter(job_name.eq(job_name_val.clone()));
        items_query = items_query.filter(job_name.eq(job_name_val));
    }

    if let Some(status_val) = status_filter {
        count_query = count_query.filter(status.eq(status_val.clone()));
        items_query = items_query.filter(status.eq(status_val));
    }

    let total = count_query.count().get_result(conn)?;

    let items = items_query
        .order(started_at.desc())
        .limit(page_size)
        .offset(offset)
        .select(JobExecutionHistory::as_select())
        .load(conn)?;

    Ok((items, total))
}
