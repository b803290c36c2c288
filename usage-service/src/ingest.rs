use ledger_client::domain::Reading;
use serde::Deserialize;
use time::OffsetDateTime;

/// Wire shape of one sensor sample. Everything the device may omit is
/// optional here; defaulting happens once, in [`normalize`], and nowhere
/// else in the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSample {
    pub user_id: Option<i64>,
    pub power: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub energy: Option<f64>,
    #[serde(alias = "pf")]
    pub power_factor: Option<f64>,
    pub frequency: Option<f64>,
    pub temperature: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Validate and normalize a raw sample into a [`Reading`].
///
/// `user_id` and `power` are mandatory; the remaining numeric fields default
/// to zero and `recorded_at` falls back to `now`. No side effects.
pub fn normalize(raw: RawSample, now: OffsetDateTime) -> Result<Reading, ValidationError> {
    let user_id = raw.user_id.ok_or(ValidationError::MissingField("user_id"))?;
    let power = raw.power.ok_or(ValidationError::MissingField("power"))?;

    Ok(Reading {
        user_id,
        voltage: raw.voltage.unwrap_or(0.0),
        current: raw.current.unwrap_or(0.0),
        power,
        energy: raw.energy.unwrap_or(0.0),
        power_factor: raw.power_factor.unwrap_or(0.0),
        frequency: raw.frequency.unwrap_or(0.0),
        temperature: raw.temperature.unwrap_or(0.0),
        recorded_at: raw.timestamp.unwrap_or(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> RawSample {
        RawSample {
            user_id: Some(7),
            power: Some(120.0),
            voltage: None,
            current: None,
            energy: None,
            power_factor: None,
            frequency: None,
            temperature: None,
            timestamp: None,
        }
    }

    #[test]
    fn fills_missing_numerics_with_zero_and_defaults_timestamp() {
        let now = datetime!(2025-06-10 08:00:00 UTC);
        let reading = normalize(sample(), now).unwrap();

        assert_eq!(reading.user_id, 7);
        assert_eq!(reading.power, 120.0);
        assert_eq!(reading.voltage, 0.0);
        assert_eq!(reading.energy, 0.0);
        assert_eq!(reading.recorded_at, now);
    }

    #[test]
    fn keeps_supplied_timestamp() {
        let now = datetime!(2025-06-10 08:00:00 UTC);
        let ts = datetime!(2025-06-09 23:59:00 UTC);
        let raw = RawSample {
            timestamp: Some(ts),
            ..sample()
        };

        assert_eq!(normalize(raw, now).unwrap().recorded_at, ts);
    }

    #[test]
    fn rejects_missing_user_id() {
        let raw = RawSample {
            user_id: None,
            ..sample()
        };
        let err = normalize(raw, datetime!(2025-06-10 08:00:00 UTC)).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("user_id"));
    }

    #[test]
    fn rejects_missing_power() {
        let raw = RawSample {
            power: None,
            ..sample()
        };
        let err = normalize(raw, datetime!(2025-06-10 08:00:00 UTC)).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("power"));
    }
}
