pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod security;
