//! TKJ Learning System web server.
//!
//! This crate provides the HTTP surface of the access-control core:
//! Google sign-in, the signed session cookie, the per-route guard and the
//! protected pages of the learning system.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod pages;
