pub mod table;

pub use table::{rows_table, TableBuilder};
