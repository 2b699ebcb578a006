// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TaskDesk - Project and Bug Tracking Backend
//!
//! REST service for registrations, projects and bug intake, authenticated
//! with Supabase-issued JWTs and authorized against the registrations table.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, identity resolution and role checks
//! - `config` - Environment configuration
//! - `storage` - Postgres and in-memory persistence

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;
