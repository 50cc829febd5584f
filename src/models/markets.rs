use diesel::prelude::*;

use crate::schema::markets;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = markets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Market {
    pub id: i32,
    pub alias: String,
}
