pub mod dto;
pub mod handlers;
pub mod models;
pub mod service;

pub use handlers::job_config;
pub use service::JobService;
