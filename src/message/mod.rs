//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write `send` and
//! `recv` operations for a given transport layer; a pure-Rust TCP transport
//! for multi-process runs and a channel-backed transport for in-process
//! rank groups (and tests) are included. Collective operations and the
//! byte-stream framing live with the typed message layer in
//! `crate::partition`, not here.

mod backoff;
pub mod channel;
pub mod comm;
pub mod tcp;
