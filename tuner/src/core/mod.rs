//! Deterministic, pure logic for configuration expansion and slot bookkeeping.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! configuration trees and return deterministic outputs suitable for tests.

pub mod collect;
pub mod combine;
pub mod defaults;
pub mod expand;
pub mod keys;
pub mod node;
pub mod product;
pub mod slots;
pub mod stop;
