//! Domain model for quizzes, questions and sittings.
//!
//! Everything here is pure: no I/O, and time always comes from a [`Clock`].

pub mod error;
pub mod model;
pub mod time;

pub use error::Error;
pub use time::Clock;
