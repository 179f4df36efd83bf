pub mod service;
pub mod store;

pub use service::DocumentService;
pub use store::DocumentStore;
