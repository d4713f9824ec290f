pub mod cleaner;
pub mod dates;
pub mod focus_mode;
pub mod metadata;
pub mod priority;
pub mod processor;
pub mod samples;
