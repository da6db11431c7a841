pub mod config;
pub mod controller;

pub use config::Config;
pub use controller::Controller;
