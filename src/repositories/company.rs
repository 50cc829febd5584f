use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::models::{Company, NewCompany};
use crate::schema::companies::dsl::*;

/// (id, symbol, name) of every known company, oldest id first.
pub fn list_registry_entries(
    conn: &mut PgConnection,
) -> Result<Vec<(i32, String, String)>, diesel::result::Error> {
    companies
        .select((id, symbol, name))
        .order(id.asc())
        .load(conn)
}

pub fn insert_batch(conn: &mut PgConnection, new_rows: &[NewCompany]) -> Result<usize, diesel::result::Error> {
    if new_rows.is_empty() {
        return Ok(0);
    }
    conn.transaction(|conn| {
        let mut inserted = 0;
        for chunk in new_rows.chunks(5_000) {
            inserted += diesel::insert_into(companies).values(chunk).execute(conn)?;
        }
        Ok(inserted)
    })
}

pub fn find_by_symbol(
    conn: &mut PgConnection,
    ticker: &str,
) -> Result<Option<Company>, diesel::result::Error> {
    companies
        .filter(symbol.eq(ticker))
        .select(Company::as_select())
        .first(conn)
        .optional()
}
