#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Configuration, report models, and terminal rendering shared by the
//! Usage Reports client and CLI.

pub mod config;
pub mod models;
pub mod render;
