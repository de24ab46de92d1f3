mod join_request;
mod ride;
mod user;

pub use join_request::{Decision, JoinRequest, Status};
pub use ride::{Coordinates, Ride, RideDraft};
pub use user::User;
