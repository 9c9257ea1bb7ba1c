pub mod budget;
pub mod driver;
pub mod feed;
pub mod logging;
pub mod notify;
pub mod rules;
pub mod schedule;
pub mod state;

#[cfg(test)]
mod testutil;
