//! dockrun CLI - package a directory as a build context and build it with Docker.

pub mod commands;
