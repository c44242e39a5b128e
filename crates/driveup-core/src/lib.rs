//! driveup core - domain types, ports and configuration
//!
//! This crate holds everything about an upload that does not touch the network:
//! - **Domain types** - `Credentials`, `TokenSet`, `AuthState`, `UploadRequest`,
//!   `UploadProgress`, `UploadResult`
//! - **Ports** - `TokenPersister`, the write-through callback for refreshed tokens
//! - **Configuration** - YAML-backed settings with validation and a builder
//!
//! # Architecture
//!
//! The adapter crate (`driveup-drive`) talks to the storage provider and
//! implements the upload pipeline on top of these types. Front ends such as
//! `driveup-cli` supply the port implementations.

pub mod config;
pub mod domain;
pub mod ports;
