pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod scope;
pub mod store;
pub mod window;

pub use engine::*;
pub use error::*;
pub use models::*;
pub use repository::*;
pub use scope::*;
pub use store::*;
pub use window::*;
