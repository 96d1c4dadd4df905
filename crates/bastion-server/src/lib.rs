#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;

pub mod bootstrap;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod prelude;
pub mod service;
pub mod utility;

pub use crate::error::{BoxedError, Error, ErrorKind, Result};

/// Fixed URL prefix under which every mounted route tree is served.
pub const API_PREFIX: &str = "/api";
