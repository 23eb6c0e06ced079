//! CLI module for the imgly-bgstudio binary
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{
    main, BatchArgs, Cli, CliOutputFormat, CliQuality, CliServerFormat, Command, ComposeArgs,
    EditArgs, GalleryCommand, HistoryCommand, RemoveArgs,
};
