//! Service layer over the store and the deploy queue

pub mod deployments;
pub mod projects;
