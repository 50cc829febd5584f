use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::models::{Daystock, NewDaystock};
use crate::schema::daystocks::dsl::*;

const UPSERT_CHUNK: usize = 5_000;

/// Insert or replace the rollups for each `(date, cid)` key. Callers wanting
/// all-or-nothing semantics wrap this in a transaction.
pub fn upsert_batch(conn: &mut PgConnection, rows: &[NewDaystock]) -> Result<usize, diesel::result::Error> {
    let mut affected = 0;
    for chunk in rows.chunks(UPSERT_CHUNK) {
        affected += diesel::insert_into(daystocks)
            .values(chunk)
            .on_conflict((date, cid))
            .do_update()
            .set((
                open.eq(excluded(open)),
                close.eq(excluded(close)),
                high.eq(excluded(high)),
                low.eq(excluded(low)),
                volume.eq(excluded(volume)),
            ))
            .execute(conn)?;
    }
    Ok(affected)
}

pub fn find_by_pk(
    conn: &mut PgConnection,
    day: NaiveDate,
    company_id: i32,
) -> Result<Option<Daystock>, diesel::result::Error> {
    daystocks
        .filter(date.eq(day))
        .filter(cid.eq(company_id))
        .select(Daystock::as_select())
        .first(conn)
        .optional()
}
