pub mod db;
pub mod steam;
pub mod store;
