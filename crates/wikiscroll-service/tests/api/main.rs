#[path = "../common/mod.rs"]
mod common;

mod feed;
mod profile;
mod state;
mod tracking;
