//! Core types shared by the TKJ Learning System crates.
//!
//! This crate provides the strongly-typed user identifier and the
//! `Result` alias used with rootcause reports.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, UserId};
