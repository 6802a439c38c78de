#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod channels;
pub mod error;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Prefix shared by every channel this crate registers with a host runtime.
pub const PLUGIN_NAME: &str = "tech.sharpbitstudio.web_socket_support";
