pub mod guest;

pub use guest::{EmailAddress, GuestInfoError, GuestInfoInput, LocationInput};
