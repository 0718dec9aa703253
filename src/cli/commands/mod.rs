pub mod cache;
pub mod fetch;
pub mod predict;
pub mod send;
