//! Layered settings and logging bootstrap.

pub use rivet_conf::*;
