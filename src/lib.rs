pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod invoice;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
