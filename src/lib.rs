pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod financial;
pub mod models;
pub mod report;
pub mod resolution;
pub mod responsibility;
pub mod risk;
pub mod time_alerts;
