pub mod app_config;
pub mod command;
pub mod event_handler;
pub mod forecast;
pub mod forecast_poster;
pub mod forecast_store;
pub mod interaction;
pub mod logger;
pub mod mention;
pub mod middleware;
pub mod schedule;
pub mod tenki_command;
#[cfg(test)]
mod testing;
