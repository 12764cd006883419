pub mod error;
pub mod schema;
pub mod token;
pub mod validate;
