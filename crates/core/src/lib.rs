//! Mission attendance domain.
//!
//! Calendar rules, form schemas, the marking and summary engines, and the
//! storage traits they run against. No I/O beyond those traits.

pub mod attendance;
pub mod attendance_form;
pub mod calendar;
pub mod config_service;
pub mod error;
pub mod form_service;
pub mod marking;
pub mod memory;
pub mod mission_config;
pub mod object_id;
pub mod roles;
pub mod roster;
pub mod store;
pub mod summary;
pub mod types;
