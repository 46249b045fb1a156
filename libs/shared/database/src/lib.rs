pub mod codec;
pub mod sqlite;

pub use sqlite::{connect, init_schema, SCHEMA};
