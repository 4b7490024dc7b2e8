//! Timestamps and the injected clock used for auto-populated fields
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// `None` when the fields do not name a real UTC instant.
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

// Stored as nanoseconds since the epoch.
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

// RFC 3339 on the JSON side, which is what the route layer hands us.
impl Serialize for TimeStamp<Utc> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TimeStamp<Utc> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        DateTime::<Utc>::deserialize(deserializer).map(TimeStamp)
    }
}

/// Source of "now" for fields the normalizer fills in on its own.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimeStamp<Utc>;
}

/// Wall clock, used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp<Utc> {
        TimeStamp::new()
    }
}

/// Clock frozen at a single instant, for deterministic tests and replays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedClock {
    instant: TimeStamp<Utc>,
}

impl FixedClock {
    pub fn new(instant: TimeStamp<Utc>) -> Self {
        Self { instant }
    }
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        TimeStamp::new_with(year, month, day, hour, min, sec).map(Self::new)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> TimeStamp<Utc> {
        self.instant.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn fixed_clock_never_moves() {
        let clock = FixedClock::at(2020, 2, 1, 12, 0, 0).unwrap();

        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), TimeStamp::new_with(2020, 2, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn impossible_dates_have_no_timestamp() {
        assert_eq!(TimeStamp::new_with(2023, 2, 30, 0, 0, 0), None);
        assert_eq!(TimeStamp::new_with(2024, 1, 1, 24, 0, 0), None);
        assert_eq!(FixedClock::at(2024, 13, 1, 0, 0, 0), None);
    }

    #[test]
    fn timestamp_reads_rfc3339() {
        let ts: TimeStamp<Utc> = serde_json::from_str("\"2020-02-01T00:00:00Z\"").unwrap();

        assert_eq!(ts, TimeStamp::new_with(2020, 2, 1, 0, 0, 0).unwrap());
    }
}
