//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` struct matching the table row plus
//! the conversion into the `mission_core` domain type.

pub mod attendance_form;
pub mod attendance_log;
pub mod mission;
pub mod roster;
