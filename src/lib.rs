pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod gateway;
pub mod personas;
pub mod session;
pub mod tasks;
pub mod tools;
