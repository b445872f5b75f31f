//! krr-daemon - periodic resource recommendations served over HTTP

pub mod api;
pub mod config;
