//! Deterministic rule-driven baseline agents for the Ensemble engine.
//!
//! These executors produce canned, structurally realistic artifacts with
//! fixed usage costs, so topology behavior can be exercised and measured
//! without any content-generation backend. Each agent keeps a private
//! message-log memory fed by routed messages.
//!
//! # Roles
//!
//! - [`ProductManagerAgent`] (`pm`) — requirements document.
//! - [`ArchitectAgent`] (`architect`) — architecture document.
//! - [`BackendDeveloperAgent`] (`backend_dev`) — backend code bundle.
//! - [`FrontendDeveloperAgent`] (`frontend_dev`) — frontend code bundle.
//! - [`QaAgent`] (`qa`) — QA report.
//! - [`DevOpsAgent`] (`devops`) — deployment report; signals `stop`.
//! - [`CoordinatorAgent`] (`coordinator`) — hub-and-spoke routing decisions.
//! - [`PeerReviewerAgent`] (`reviewer`) — deterministic review verdicts.

/// Architecture producer.
pub mod architect;
/// Backend code producer.
pub mod backend_dev;
/// Hub-and-spoke routing agent.
pub mod coordinator;
/// Deployment reporter.
pub mod devops;
/// Frontend code producer.
pub mod frontend_dev;
/// Requirements producer.
pub mod product_manager;
/// QA report producer.
pub mod qa;
/// Deterministic peer reviewer.
pub mod reviewer;

pub use architect::ArchitectAgent;
pub use backend_dev::BackendDeveloperAgent;
pub use coordinator::CoordinatorAgent;
pub use devops::DevOpsAgent;
pub use frontend_dev::FrontendDeveloperAgent;
pub use product_manager::ProductManagerAgent;
pub use qa::QaAgent;
pub use reviewer::PeerReviewerAgent;
