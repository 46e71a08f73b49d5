//! Test suites for the dispatch engine.

mod dispatcher_api;
mod resolution;
mod support;
