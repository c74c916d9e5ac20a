//! Site Deployer Library
//!
//! Clones a repository branch, builds it and publishes the output as a site
//! on a content-addressed storage network, tracking each deployment.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod queue;
pub mod server;
pub mod services;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
