//! Duka backend: M-Pesa payment processing and account verification for a
//! mobile-commerce storefront.
//!
//! The crate is organized in layers: `payments` speaks to the Daraja API,
//! `database` owns persistence behind store traits, `services` carries the
//! business rules (reconciliation, polling, the OTP lifecycle, admin
//! purge), and `api` exposes the HTTP surface.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
