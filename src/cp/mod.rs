//! Constraint programming layer.
//!
//! A small CP modeling vocabulary (boolean and integer variables, optional
//! fixed-size intervals, clause/no-overlap/domain constraints, a weighted
//! literal objective) and the [`CpSolver`] contract the timetabling engine
//! solves against. [`MipSolver`] encodes the model as a time-indexed 0-1
//! program for `good_lp`; other engines can be plugged in through the trait.
//!
//! # Reference
//! - Laborie et al. (2018), "IBM ILOG CP Optimizer for Scheduling"
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

mod mip;
mod model;
mod solver;
mod variables;

pub use mip::MipSolver;
pub use model::{Constraint, CpModel, Objective, VarRef};
pub use solver::{AbortHandle, CpSolution, CpSolver, SolverConfig, SolverStatus};
pub use variables::{BoolVar, BoolVarId, Domain, IntVar, IntVarId, IntervalId, IntervalVar, Literal};
