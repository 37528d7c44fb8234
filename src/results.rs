mod row;

pub use row::{Columns, DbRow};
