//! Time-window intervals.
//!
//! An [`Interval`] says whether a device should hash, at what price and under
//! which performance limit, during a daily time window within a yearly date
//! range on selected weekdays, optionally bounded by ambient temperature.
//!
//! Daily windows are half-open `[start, end)`. An end of `00:00` means the end
//! of the calendar day, so `00:00`-`00:00` is an all-day window. A window whose
//! start is not before its end wraps past midnight; the part after midnight
//! belongs to the day the window opened, which is the date checked against the
//! date range and weekday filter.

mod eval;
mod model;


pub use self::model::Interval;
