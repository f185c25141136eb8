//! Test modules for the barrier system
//!
//! Suites are organized by functional area; `support` holds the shared
//! fixtures (message builders, a hand-driven scheduler, channel helpers).

mod support;
mod timeout;
