// src/lib.rs

pub mod entity;
pub mod repository;
pub mod service;
pub mod app_state;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod middleware;
