//! Shared plumbing for the s1watch binaries.

pub mod signal;
