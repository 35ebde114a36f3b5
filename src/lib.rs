pub mod annotator;
pub mod app;
pub mod camera;
pub mod config;
pub mod coordinator;
pub mod detection;
pub mod entity;
pub mod home_assistant;
pub mod prediction;
pub mod routes;
pub mod server;
pub mod service;
pub mod telemetry;

pub use app::start_app;
