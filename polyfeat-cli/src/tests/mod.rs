//! Shared test harness modules for the polyfeat CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod helpers;
mod pipeline;
mod steps;
