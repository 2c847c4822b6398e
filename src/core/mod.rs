pub mod auth;
pub mod chat;
pub mod contexts;
pub mod error;
pub mod links;
pub mod policy;
pub mod products;
pub mod rag;
pub mod settings;
pub mod tenants;
pub mod traits;
pub mod validation;

pub use error::{Error, Result};
