pub mod app;
pub mod browser;
pub mod config;
pub mod download;
pub mod duration;
pub mod filename;
pub mod invoice;
pub mod links;
