mod audit;
mod booking;
mod command;
mod driver;

pub use audit::{audit, Violation};
pub use booking::{Booking, NewBooking, Status};
pub use command::{Command, Effect};
pub use driver::{Availability, Driver, NewDriver};
