use diesel::prelude::*;

use crate::schema::companies;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = companies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Company {
    pub id: i32,
    pub name: String,
    pub mid: i32,
    pub symbol: String,
    pub symbol_nf: Option<String>,
    pub isin: Option<String>,
    pub reuters: Option<String>,
    pub boursorama: Option<String>,
    pub pea: bool,
    pub sector: Option<i32>,
}

/// Creation request emitted by the symbol registry. `id` is allocated by the
/// registry, not by the database.
#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = companies)]
pub struct NewCompany {
    pub id: i32,
    pub name: String,
    pub mid: i32,
    pub symbol: String,
    pub pea: bool,
}
