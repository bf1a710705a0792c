//! Tools that need infrastructure (network access) and so live outside core.

pub mod http_request;
