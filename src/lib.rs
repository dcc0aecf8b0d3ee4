pub mod api;
pub mod auth;
pub mod blynk;
pub mod config;
pub mod db;
pub mod irrigation;
pub mod policy;
pub mod pump;
pub mod readings;
pub mod users;
