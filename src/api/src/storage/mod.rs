//! SQLite storage for predictions, results and accuracy records
//!
//! The repository implements the validation collaborator traits, so a
//! validation run can read and write through a single database file.

pub mod repository;
pub mod schema;

pub use repository::ValidationRepository;
pub use schema::create_tables;
