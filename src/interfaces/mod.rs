//! Delivery mechanisms

pub mod http;
