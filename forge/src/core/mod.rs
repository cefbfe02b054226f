//! Deterministic, pure logic shared by the forge commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod activity;
pub mod checkpoint;
pub mod event;
pub mod stage;
pub mod summary;
