use chrono::NaiveDate;
use diesel::prelude::*;

use crate::schema::daystocks;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = daystocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Daystock {
    pub date: NaiveDate,
    pub cid: i32,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = daystocks)]
pub struct NewDaystock {
    pub date: NaiveDate,
    pub cid: i32,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
}
