use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::stocks;

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = stocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Stock {
    pub date: NaiveDateTime,
    pub cid: i32,
    pub value: f64,
    pub volume: i64,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = stocks)]
pub struct NewStock {
    pub date: NaiveDateTime,
    pub cid: i32,
    pub value: f64,
    pub volume: i64,
}
