//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod attendance_form_repo;
pub mod attendance_log_repo;
pub mod mission_repo;
pub mod roster_repo;

pub use attendance_form_repo::AttendanceFormRepo;
pub use attendance_log_repo::AttendanceLogRepo;
pub use mission_repo::MissionRepo;
pub use roster_repo::RosterRepo;
