pub mod capacity;
pub mod config;
pub mod error;
pub mod labels;
pub mod payload;
pub mod render;
pub mod segment;
pub mod store;
pub mod types;
pub mod validator;
pub mod wastage;

pub use error::{PlanError, Result};
