use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::models::Market;
use crate::schema::markets::dsl::*;

pub fn list_all(conn: &mut PgConnection) -> Result<Vec<Market>, diesel::result::Error> {
    markets
        .select(Market::as_select())
        .order(id.asc())
        .load(conn)
}
