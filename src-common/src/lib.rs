//! framecap common library
//!
//! Platform directory resolution and logging bootstrap shared by the framecap
//! crates and the applications embedding them.

pub mod logging;
pub mod paths;
