use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::models::{NewStock, Stock};
use crate::schema::stocks::dsl::*;

// 4 bind parameters per row, postgres caps a statement at 65535
const INSERT_CHUNK: usize = 10_000;

/// Append-only bulk insert. Returns the number of rows written.
pub fn insert_batch(conn: &mut PgConnection, rows: &[NewStock]) -> Result<usize, diesel::result::Error> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        inserted += diesel::insert_into(stocks).values(chunk).execute(conn)?;
    }
    Ok(inserted)
}

/// Ticks with `from <= date < until`, ordered by company then timestamp.
pub fn load_range(
    conn: &mut PgConnection,
    from: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<Stock>, diesel::result::Error> {
    stocks
        .filter(date.ge(from))
        .filter(date.lt(until))
        .order((cid.asc(), date.asc()))
        .select(Stock::as_select())
        .load(conn)
}

pub fn count_all(conn: &mut PgConnection) -> Result<i64, diesel::result::Error> {
    stocks.count().get_result(conn)
}
