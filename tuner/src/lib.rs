//! Hyperparameter sweep tool for reinforcement-learning trainers.
//!
//! A configuration document marks candidate values with `opt_values` and
//! early-stop bounds with `opt_stop`. The tuner expands every combination
//! into standalone job files, then runs those jobs through a fixed number of
//! slots, stopping runs whose reported metrics leave their bounds.
//!
//! - **[`core`]**: Pure expansion, combination and slot bookkeeping. No I/O.
//! - **[`io`]**: Documents, config, trainer processes, metrics queries and
//!   interrupts.
//!
//! [`plan`] turns a document into job files; [`schedule`] runs them;
//! [`sweep`] wires the two together for `tuner run`.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod schedule;
pub mod sweep;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
