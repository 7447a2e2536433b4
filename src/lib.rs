pub mod api;
pub mod auth;
pub mod cli;
pub mod database;
pub mod domain;
pub mod endpoints;
pub mod errors;
pub mod http;
pub mod notify;
pub mod routes;
pub mod threadpool;
