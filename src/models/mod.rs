pub mod activity;
pub mod appointment;
pub mod client;
pub mod vehicle;

pub use activity::ActivityEvent;
pub use appointment::{Appointment, AppointmentStatus};
pub use client::Client;
pub use vehicle::Vehicle;
