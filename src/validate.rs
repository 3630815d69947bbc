use lazy_static::lazy_static;
use regex::Regex;

use crate::calendar::YearMonth;
use crate::calendar::month::ParseYearMonthError;
use crate::error::{AppError, AppResult};

lazy_static! {
    static ref USERNAME: Regex = Regex::new(r"^[a-zA-Z0-9_.-]{3,32}$").unwrap();
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref COLOR: Regex = Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap();
    static ref YEAR_MONTH: Regex = Regex::new(r"^\d{4}-\d{2}$").unwrap();
    static ref XLSX_FILE: Regex = Regex::new(r"(?i)^[^/\\]+\.xlsx$").unwrap();
}

pub fn username(value: &str) -> AppResult<()> {
    if USERNAME.is_match(value) {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "username must be 3-32 letters, digits, '.', '_' or '-'",
        ))
    }
}

pub fn email(value: &str) -> AppResult<()> {
    if EMAIL.is_match(value.trim()) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("invalid email address '{}'", value)))
    }
}

pub fn color(value: &str) -> AppResult<()> {
    if COLOR.is_match(value) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("invalid color '{}', expected #rrggbb", value)))
    }
}

pub fn xlsx_file_name(value: &str) -> AppResult<()> {
    if XLSX_FILE.is_match(value) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("'{}' is not an .xlsx file", value)))
    }
}

/// Parses a `YYYY-MM` month filter
pub fn year_month(value: &str) -> AppResult<YearMonth> {
    let value = value.trim();
    if !YEAR_MONTH.is_match(value) {
        return Err(AppError::bad_request(format!(
            "invalid month '{}', expected YYYY-MM",
            value
        )));
    }
    value
        .parse()
        .map_err(|e: ParseYearMonthError| AppError::bad_request(e.to_string()))
}

/// Year and month taken from a URL path
pub fn path_month(year: i32, month: u32) -> AppResult<YearMonth> {
    YearMonth::new(year, month)
        .ok_or_else(|| AppError::bad_request(format!("invalid month {}-{}", year, month)))
}

/// Trims `value` and rejects it when nothing is left
pub fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::bad_request(format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Blank optional text becomes `None`
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn password(value: &str) -> AppResult<()> {
    if value.chars().count() < 8 {
        Err(AppError::bad_request("password must be at least 8 characters"))
    } else {
        Ok(())
    }
}
