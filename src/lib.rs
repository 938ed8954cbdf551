pub mod background;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod sync;
pub mod timetable;
pub mod wal;
