// src/handlers/mod.rs
pub mod index;
pub mod status;
