//! Stateful gates of the hook relay: the human-in-the-loop approval gate and
//! the end-of-turn reentrancy guard.

pub mod hitl;
pub mod reentrancy;

pub use hitl::{HitlGate, HitlTimings, HttpDecisionService};
pub use reentrancy::{
    AtomicMarker, FileMarker, ReentrancyGuard, ReentrancyMarker, ReentrancyScope,
    STOP_MARKER_FILE,
};
