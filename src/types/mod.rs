pub mod calendar;
pub mod location;
