#![doc = include_str!("../README.md")]

pub mod server;

pub use server::{
    config::ServerConfig,
    lifecycle::{GrpcServer, ServerHandle},
    resolver::{Resolver, StaticResolver},
};
