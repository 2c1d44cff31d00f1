//! Chat Link Keeper library.
//!
//! Watches chat messages for URLs and makes sure each distinct URL is saved
//! to the Wayback Machine once, remembering the outcome in a SQLite cache
//! that can be browsed through a small JSON API.

pub mod admission;
pub mod archiver;
pub mod config;
pub mod constants;
pub mod db;
pub mod ingress;
pub mod wayback;
pub mod web;
