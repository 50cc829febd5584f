use diesel::prelude::*;

use crate::schema::file_done;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = file_done)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FileDone {
    pub name: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = file_done)]
pub struct NewFileDone<'a> {
    pub name: &'a str,
}
