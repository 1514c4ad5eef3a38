#![doc = include_str!("../README.md")]

pub mod common;
pub use common::*;
