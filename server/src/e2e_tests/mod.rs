//! End-to-end tests at the HTTP request/response level.
//!
//! Each test file covers a specific scenario, driving the real router over a
//! dataset file on disk with a fixed clock.

#![cfg(test)]

mod helpers;

mod test_health;
mod test_login;
mod test_reload;
mod test_teams;
mod test_verify;
