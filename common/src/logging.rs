use chrono::{DateTime, Datelike, Local, Timelike};
use log::Record;
use std::fmt::Arguments;

pub const DEFAULT_FORMAT: &str = "[$Y-$m-$D $H:$M:$S $LEVEL] $MESSAGE";

pub fn generate_file_name(title: &str) -> String {
    file_name_at(title, &Local::now())
}

fn file_name_at(title: &str, now: &DateTime<Local>) -> String {
    let date = format!(
        "{year:04}-{month:02}-{day:02}",
        year = now.year(),
        month = now.month(),
        day = now.day(),
    );

    let title_formatted = title.trim().replace(" ", "-");
    format!("{title_formatted}_{date}.log")
}

/// Expands the placeholders of `format`:
/// `$Y $m $D $H $M $S` (local time), `$LEVEL`, `$TARGET`, `$MESSAGE`.
pub fn parse_format(format: &str, message: &Arguments, record: &Record) -> String {
    expand(format, &Local::now(), record.level().as_str(), record.target(), message)
}

fn expand(
    format: &str, time: &DateTime<Local>, level: &str, target: &str, message: &Arguments,
) -> String {
    let mut log = format.trim().to_string();

    // Time
    log = log.replacen("$Y", &format!("{:0>2}", time.year()), 1);
    log = log.replacen("$m", &format!("{:0>2}", time.month()), 1);
    log = log.replacen("$D", &format!("{:0>2}", time.day()), 1);
    log = log.replacen("$H", &format!("{:0>2}", time.hour()), 1);
    log = log.replacen("$M", &format!("{:0>2}", time.minute()), 1);
    log = log.replacen("$S", &format!("{:0>2}", time.second()), 1);

    // Level
    log = log.replacen("$LEVEL", level, 1);

    // Target
    log = log.replacen("$TARGET", target, 1);

    // Message
    log = log.replacen("$MESSAGE", &message.to_string(), 1);

    log
}

pub use error::LogError;

pub mod error;
