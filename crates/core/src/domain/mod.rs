pub mod bar;
pub mod metric;
pub mod ticker;
