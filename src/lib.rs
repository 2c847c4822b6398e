//! Multi-tenant shopping assistant gateway - library exports for testing

pub mod api;
pub mod core;
pub mod infrastructure;
pub mod widget;
