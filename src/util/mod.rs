//! Small filesystem helpers shared by the naming, transfer and cleanup paths.

pub mod fs;
