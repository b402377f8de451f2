//! AWS federated access
//!
//! Exchanges the OIDC identity for temporary AWS credentials and console
//! signin URLs, and keeps the bounded role-ARN history.

pub mod errors;
pub mod federation;
pub mod history;
pub mod sts;

pub use errors::FederationError;
pub use federation::FederationService;
pub use history::RoleHistory;
