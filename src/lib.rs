//! todo-ai: turn meeting notes into a to-do list.
//!
//! Notes go through an [`extract::Extractor`], the resulting tasks land on a
//! shared [`board::Board`] backed by one JSON file, and a background
//! [`watcher::Watcher`] stamps a start time on each task the first time it
//! sees it open.

pub mod board;
pub mod cli;
pub mod config;
pub mod extract;
pub mod model;
pub mod store;
pub mod view;
pub mod watcher;
