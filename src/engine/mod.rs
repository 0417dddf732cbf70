//! Core engine — the poll → follow → notify loop and its start gate.

pub mod follower;
pub mod schedule;
