use std::collections::HashSet;

use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::models::NewFileDone;
use crate::schema::file_done::dsl::*;

pub fn is_done(conn: &mut PgConnection, filename: &str) -> Result<bool, diesel::result::Error> {
    diesel::select(diesel::dsl::exists(file_done.filter(name.eq(filename)))).get_result(conn)
}

/// Marking an already-done file is a no-op.
pub fn mark_done(conn: &mut PgConnection, filename: &str) -> Result<(), diesel::result::Error> {
    diesel::insert_into(file_done)
        .values(&NewFileDone { name: filename })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Subset of `filenames` already recorded as done.
pub fn done_among(
    conn: &mut PgConnection,
    filenames: &[String],
) -> Result<HashSet<String>, diesel::result::Error> {
    if filenames.is_empty() {
        return Ok(HashSet::new());
    }
    let found: Vec<String> = file_done
        .select(name)
        .filter(name.eq_any(filenames))
        .load(conn)?;
    Ok(found.into_iter().collect())
}
