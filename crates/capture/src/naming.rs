use chrono::{DateTime, Local, TimeZone};

use shutterlink_protocol::constants::FOLDER_NAME_FORMAT;

/// Folder name derived from the current local time, e.g. `20240101_093000`.
pub fn generate_folder_name() -> String {
    folder_name_at(&Local::now())
}

pub fn folder_name_at<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(FOLDER_NAME_FORMAT).to_string()
}
