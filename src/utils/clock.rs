use chrono::{DateTime, Local};

use super::time::DayKey;

/// Represents an entity responsible for providing dates across application. This can allow it to
/// be used for testing
pub trait Clock: Sync + Send + 'static {
    fn now(&self) -> DateTime<Local>;

    /// The day the user currently sees on their wall clock.
    fn today(&self) -> DayKey {
        DayKey::from_local(&self.now())
    }
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
