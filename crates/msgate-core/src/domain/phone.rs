use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MIN_E164_DIGITS: usize = 8;
const MAX_E164_DIGITS: usize = 15;

const GHANA_COUNTRY_CODE: &str = "233";
const GHANA_SUBSCRIBER_DIGITS: usize = 9;
/// Two-digit national prefixes allocated to Ghanaian mobile networks.
const GHANA_MOBILE_PREFIXES: [&str; 14] = [
    "20", "23", "24", "25", "26", "27", "28", "50", "53", "54", "55", "56", "57", "59",
];

/// Normalized international mobile number in E.164 form (`+` followed by digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Msisdn(String);

impl Msisdn {
    /// Parse an international number written as `+CC...` or `00CC...`.
    ///
    /// Spaces, dashes, dots, and parentheses are ignored.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let compact = strip_separators(input)?;
        let digits = if let Some(rest) = compact.strip_prefix('+') {
            rest
        } else if let Some(rest) = compact.strip_prefix("00") {
            rest
        } else {
            return Err(ValidationError::NotInNumberingPlan {
                value: input.trim().to_owned(),
                country: "E.164",
            });
        };

        check_digits(digits)?;
        if digits.starts_with('0') {
            return Err(ValidationError::NotInNumberingPlan {
                value: input.trim().to_owned(),
                country: "E.164",
            });
        }

        Ok(Self(format!("+{digits}")))
    }

    /// Parse a Ghanaian mobile number in national (`0XX...`) or international form.
    pub fn parse_ghana_mobile(input: &str) -> Result<Self, ValidationError> {
        let compact = strip_separators(input)?;
        let international = compact
            .strip_prefix('+')
            .or_else(|| compact.strip_prefix("00"))
            .unwrap_or(compact.as_str());
        check_digits(international)?;

        let subscriber = if let Some(rest) = international.strip_prefix(GHANA_COUNTRY_CODE) {
            rest
        } else if compact.len() == GHANA_SUBSCRIBER_DIGITS + 1 && compact.starts_with('0') {
            &compact[1..]
        } else {
            ""
        };

        let in_plan = subscriber.len() == GHANA_SUBSCRIBER_DIGITS
            && GHANA_MOBILE_PREFIXES
                .iter()
                .any(|prefix| subscriber.starts_with(prefix));
        if !in_plan {
            return Err(ValidationError::NotInNumberingPlan {
                value: input.trim().to_owned(),
                country: "GH",
            });
        }

        Ok(Self(format!("+{GHANA_COUNTRY_CODE}{subscriber}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number without the leading `+`, as most provider APIs expect.
    pub fn digits(&self) -> &str {
        &self.0[1..]
    }
}

impl Display for Msisdn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Msisdn {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Msisdn> for String {
    fn from(value: Msisdn) -> Self {
        value.0
    }
}

/// Validate an alphanumeric sender id (letters, digits, and spaces).
pub fn validate_alphanumeric_sender(value: &str, max_len: usize) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptySenderId);
    }

    let len = trimmed.chars().count();
    if len > max_len {
        return Err(ValidationError::SenderIdTooLong { len, max: max_len });
    }

    if let Some(ch) = trimmed
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == ' '))
    {
        return Err(ValidationError::SenderIdInvalidChar { ch });
    }

    Ok(())
}

fn strip_separators(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPhoneNumber);
    }

    let mut compact = String::with_capacity(trimmed.len());
    for (index, ch) in trimmed.chars().enumerate() {
        match ch {
            ' ' | '-' | '.' | '(' | ')' => {}
            '+' if index == 0 => compact.push(ch),
            c if c.is_ascii_digit() => compact.push(c),
            other => return Err(ValidationError::PhoneInvalidChar { ch: other, index }),
        }
    }
    Ok(compact)
}

fn check_digits(digits: &str) -> Result<(), ValidationError> {
    let len = digits.len();
    if !(MIN_E164_DIGITS..=MAX_E164_DIGITS).contains(&len) {
        return Err(ValidationError::PhoneLength {
            len,
            min: MIN_E164_DIGITS,
            max: MAX_E164_DIGITS,
        });
    }
    Ok(())
}
