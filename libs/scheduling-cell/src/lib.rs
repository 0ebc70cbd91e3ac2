pub mod interval;
pub mod models;
pub mod services;
pub mod store;

pub use models::*;
pub use interval::TimeRange;
pub use services::booking::AppointmentBookingService;
