pub mod attendance;
pub mod attendance_forms;
pub mod mission_config;
