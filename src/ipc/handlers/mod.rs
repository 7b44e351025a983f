pub mod auth;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod import;
pub mod questions;
pub mod reading;
pub mod stories;
pub mod students;
pub mod users;
