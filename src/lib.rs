pub mod app;
pub mod authz;
pub mod config;
pub mod db;
pub mod errors;
pub mod gateway;
pub mod token;

// Re-export commonly used items for tests
pub use app::create_app;
