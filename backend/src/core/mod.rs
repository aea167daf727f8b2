//! Simulated time: calendar, block heights and event scheduling

pub mod calendar;

pub use calendar::{BlockWindow, Calendar, CalendarConfig, ScheduleError, Slot, SpacingPolicy};
