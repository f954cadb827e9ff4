//! Weekly class timetables for college sections.
//!
//! A [`TimetableInput`](data::TimetableInput) is normalized, encoded as a 0-1
//! model, solved with HiGHS and decoded into one grid per section. See
//! [`timetable::generate`].

pub mod config;
pub mod data;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod model;
pub mod normalize;
pub mod server;
pub mod solver;
pub mod timetable;
