//! `registry` crate: the live route table and UI registry that deployed
//! workflows are exposed through.
//!
//! Both registries sit behind one [`DeploymentRegistrar`], whose single lock
//! makes the collision check atomic with the insert.

pub mod error;
pub mod models;
pub mod registrar;

pub use error::RegistrationConflictError;
pub use models::{DeploymentRecord, DeploymentStatus};
pub use registrar::{DeploymentRegistrar, RegisterOutcome};
