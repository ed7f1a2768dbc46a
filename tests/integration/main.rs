//! End-to-end tests over the full in-process stack: protocol gateway with
//! scripted stations, session registry, connector oracle, broadcaster, and
//! the session service.

mod helpers;

mod concurrency_test;
mod failure_test;
mod lifecycle_test;
mod realtime_test;
