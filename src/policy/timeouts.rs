use nom::bytes::complete::take_while;
use nom::character::complete::{digit1, multispace0};
use nom::combinator::{all_consuming, map_res};
use nom::sequence::{preceded, terminated, tuple};
use nom::IResult;

use crate::error::InnerError;
use crate::rules::ast::SetValue;

/// A timeout value parsed from `SET lock_timeout` / `SET statement_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// `0` disables the timeout.
    Unlimited,
    Millis(u64),
}

impl Timeout {
    /// Whether this timeout is laxer than the given ceiling. A disabled
    /// timeout is laxer than any ceiling.
    pub fn exceeds(&self, ceiling_ms: u64) -> bool {
        match self {
            Timeout::Unlimited => true,
            Timeout::Millis(ms) => *ms > ceiling_ms,
        }
    }
}

fn number(s: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>)(s)
}

fn unit(s: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_ascii_alphabetic())(s)
}

fn duration(s: &str) -> IResult<&str, (u64, &str)> {
    terminated(tuple((number, preceded(multispace0, unit))), multispace0)(s)
}

/// Parse a timeout per the PostgreSQL duration grammar: `2s`, `500ms`,
/// `5min`, `1h`, `2 seconds`; a bare number means milliseconds and `0`
/// disables the timeout.
pub fn parse_timeout(value: &SetValue) -> crate::Result<Timeout> {
    match value {
        SetValue::Int(n) if *n == 0 => Ok(Timeout::Unlimited),
        SetValue::Int(n) if *n > 0 => Ok(Timeout::Millis(*n as u64)),
        SetValue::Int(n) => Err(InnerError::InvalidDuration(n.to_string()).into()),
        SetValue::Str(s) => parse_duration_str(s.trim()),
    }
}

fn parse_duration_str(s: &str) -> crate::Result<Timeout> {
    let (_, (amount, unit)) = all_consuming(duration)(s)
        .map_err(|_| InnerError::InvalidDuration(s.to_string()))?;
    let millis = match unit.to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "millisecond" | "milliseconds" => Some(amount),
        "us" | "usec" | "microsecond" | "microseconds" => Some(amount / 1000),
        "s" | "sec" | "secs" | "second" | "seconds" => amount.checked_mul(1_000),
        "min" | "mins" | "minute" | "minutes" => amount.checked_mul(60_000),
        "h" | "hr" | "hour" | "hours" => amount.checked_mul(3_600_000),
        "d" | "day" | "days" => amount.checked_mul(86_400_000),
        _ => return Err(InnerError::InvalidDuration(s.to_string()).into()),
    };
    match millis {
        Some(0) if amount == 0 => Ok(Timeout::Unlimited),
        Some(ms) => Ok(Timeout::Millis(ms)),
        None => Err(InnerError::InvalidDuration(s.to_string()).into()),
    }
}
