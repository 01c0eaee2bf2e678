//! Timetabling domain models.
//!
//! Provides the data types for weekly timetabling problems and their
//! solutions. Entities reference each other by integer id.
//!
//! # Domain Mappings
//!
//! | u-timetable | School | Sports club | Clinic |
//! |-------------|--------|-------------|--------|
//! | Group | Class | Team | Patient cohort |
//! | Activity | Course | Training | Therapy plan |
//! | Session | Lesson | Practice | Appointment |
//! | Instructor | Teacher | Coach | Therapist |
//! | Venue | Classroom | Field | Treatment room |

mod activity;
mod calendar;
mod group;
mod resource;
mod restriction;
mod schedule;
mod tag;

/// Identifier shared by all entity kinds.
pub type EntityId = i64;

pub use activity::{Activity, Session, SessionId, DEFAULT_STEP_MINUTES, STEP_RANGE};
pub use calendar::{
    split_week_minute, CalendarError, ClockTime, DayToken, OpeningWindow, TimeWindow, WeekDomain, Weekday,
    DAYS_PER_WEEK, HORIZON_MINUTES, MINUTES_PER_DAY,
};
pub use group::Group;
pub use resource::{Instructor, Venue};
pub use restriction::{DayBound, Priority, Restriction, RestrictionKind};
pub use schedule::{
    CalendarEvent, CalendarEventProps, ScheduleRecord, ScheduledEvent, Violation, ViolationType, FORMAT_VERSION,
};
pub use tag::{EntityKind, Tag, TagIndex, TagLink};
