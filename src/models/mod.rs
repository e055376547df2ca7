// src/models/mod.rs
//! Data structures shared by the engine, the adapters and the API.

pub mod credential;
pub mod student;
