//! Client front-end for the book store: argument parsing, the actions a
//! user can run, and the interactive menu.

pub mod action;
pub mod cli;
pub mod menu;
