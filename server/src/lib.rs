// Life of a login:
// 1. Client signs `username__timestamp` with its ed25519 private key
// 2. POST /login looks up the user's public key in the current snapshot
// 3. Signature verifies -> HS512 access token valid for one hour
//
// System components:
//  - Snapshot store: hot-reloaded YAML dataset of users and teams
//  - Auth service: challenge verification, token issuing and validation
//  - HTTP adapter: axum router over the auth service

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod http;
pub mod time;

mod e2e_tests;
