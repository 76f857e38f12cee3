pub mod compose;
pub mod error;
pub mod send;
