//! Small reusable bits shared by the hyper-sync crates, mostly logging
//! bootstrap. Config/CLI plumbing for the surrounding node lives outside
//! this crate.

pub mod logging;
