// `libgit2-sys` (via `git2`) doesn't always pull in advapi32 on MSVC.
// We depend on `git2` for repository fetching, so ensure the link is present.
#[cfg(windows)]
#[link(name = "advapi32")]
unsafe extern "system" {}

pub mod config;
pub mod core;
pub mod engine;
pub mod persistence;
pub mod web;
