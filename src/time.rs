use chrono::{DateTime, Datelike, Local, TimeZone, Utc};

const WEEKDAYS_PT_BR: [&str; 7] = [
    "segunda-feira",
    "terça-feira",
    "quarta-feira",
    "quinta-feira",
    "sexta-feira",
    "sábado",
    "domingo",
];

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Stamp used for `registeredAt`, in the local zone of the machine doing the registration.
pub fn registration_stamp() -> String {
    format_registration(&Local::now())
}

/// Brazilian Portuguese long form, 24h clock: `quarta-feira, 12/03/2025, 14:30:05`.
pub fn format_registration<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let weekday = WEEKDAYS_PT_BR[at.weekday().num_days_from_monday() as usize];
    format!("{weekday}, {}", at.format("%d/%m/%Y, %H:%M:%S"))
}
