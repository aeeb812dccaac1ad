pub mod config;
pub mod driver;
pub mod journal;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod request;
pub mod store;
pub mod sweeper;
