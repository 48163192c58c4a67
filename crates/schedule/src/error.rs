//! Parse and validation errors for schedule definitions.

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid time of day '{0}', expected HH:MM")]
    TimeOfDay(String),

    #[error("invalid month/day '{0}', expected MM/DD")]
    MonthDay(String),

    #[error("invalid weekday set '{0}', expected codes like MoTuWe or '*'")]
    Weekdays(String),

    #[error("unknown timezone '{0}'")]
    Timezone(String),

    #[error("temperature bounds inverted: min {min} > max {max}")]
    TemperatureBounds { min: f64, max: f64 },
}
