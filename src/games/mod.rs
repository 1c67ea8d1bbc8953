//! Board game implementations.

pub mod connect_four;
