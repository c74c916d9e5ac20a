//! Deployment module

pub mod build;
pub mod env;
pub mod fsm;
pub mod git;
pub mod pipeline;
pub mod process;
pub mod publish;
pub mod tracker;
pub mod workspace;
