//! Database models split into domain-specific modules.

pub mod document;
pub mod patient;
pub mod prescription;
pub mod user;

pub use document::*;
pub use patient::*;
pub use prescription::*;
pub use user::*;
