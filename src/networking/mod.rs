/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) networking.
//!
//! Library users provide the transport by implementing [`Network`](network::Network). Everything else
//! in this module is plumbing: a poller thread that drains the network and routes each message to the
//! thread that handles it, and a handle for sending.

pub mod messages;

pub mod network;

pub(crate) mod receiving;

pub(crate) mod sending;
