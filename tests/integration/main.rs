//! Integration test harness: end-to-end poll-and-follow runs against
//! scripted in-memory platform and notifier doubles.

mod mock_platform;
mod follow_flow;
