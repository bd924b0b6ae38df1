pub mod db;
pub mod driver;
pub mod poller;
pub mod tags;
pub mod utils;
