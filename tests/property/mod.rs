// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of the topology builder, the security rule compiler and the
//! quota limiter.

mod limiter_ceilings;
mod network_build;
mod rule_expansion;
