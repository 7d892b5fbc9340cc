//! Turn scheduling and control-flow topologies for the Ensemble engine.
//!
//! The [`Orchestrator`] executes exactly one agent's turn at a time against
//! the shared [`ensemble_core::ProjectState`], merging each executor's
//! structured output atomically. The topology state machines decide which
//! role runs next, how failures are retried, and when a run terminates:
//!
//! - [`SequentialTopology`] — fixed linear order.
//! - [`HubAndSpokeTopology`] — a coordinator decides the next role each cycle.
//! - [`PeerReviewTopology`] — bounded producer → review revision loops.
//! - [`IterativeFeedbackTopology`] — QA-gated rework with anti-loop detection.
//!
//! Scheduling is single-threaded and cooperative: one turn runs to
//! completion before the next begins, and `stop` is only honored between
//! turns.

/// The turn scheduler and its per-turn result record.
pub mod orchestrator;
/// The topology contract and the four scheduling policies.
pub mod topology;

pub use orchestrator::{Orchestrator, TurnResult, ORCHESTRATOR_SENDER};
pub use topology::hub_spoke::HubAndSpokeTopology;
pub use topology::iterative_feedback::IterativeFeedbackTopology;
pub use topology::peer_review::PeerReviewTopology;
pub use topology::sequential::{SequentialTopology, DEFAULT_SEQUENTIAL_ROLES};
pub use topology::{Topology, TopologyControls};
