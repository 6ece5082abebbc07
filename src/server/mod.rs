pub mod cors;
pub mod handlers;
pub mod router;
pub mod types;
