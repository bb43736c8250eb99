//! Detection: the rule table, both detectors, and reconciliation.

pub mod heuristic;
pub mod reconcile;
pub mod remote;
pub mod rules;
