//! Declarative identifier schemes.

use crate::core::{FetchError, FetchResult};

use chrono::Datelike;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// How the captures of a recognition pattern are validated and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchRule {
    /// Two captures: a four-digit year and a serial number.
    ///
    /// The year must fall within `min_year..=max_year` (the current year when
    /// `max_year` is unset). The serial is zero-padded to `serial_width`.
    YearSerial {
        /// Earliest accepted year.
        min_year: i32,
        /// Latest accepted year. Defaults to the current year.
        #[serde(default)]
        max_year: Option<i32>,
        /// Width of the normalized serial.
        serial_width: usize,
    },

    /// One capture: a run of digits with bounded length.
    DigitRun {
        /// Minimum number of digits.
        min_digits: usize,
        /// Maximum number of digits.
        max_digits: usize,
    },
}

/// Serializable description of an [`IdentifierScheme`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeDefinition {
    /// Office prefix of normalized identifiers, e.g. `WO`.
    pub office: String,

    /// Recognition patterns, matched case-insensitively.
    pub patterns: Vec<String>,

    /// Validation and normalization rule.
    pub rule: MatchRule,
}

impl SchemeDefinition {
    /// The WIPO publication scheme: `WO` + year + 6-digit serial.
    pub fn wo() -> Self {
        Self {
            office: "WO".to_string(),
            patterns: vec![
                r"WO[\s/\-]?(\d{4})[\s/\-]?(\d{6})".to_string(),
                r"WO[\s/\-]?(\d{4})[\s/\-]?(\d{5})".to_string(),
                r"/patent/WO(\d{4})(\d{6})".to_string(),
                r"patent[_\-]?id[=:]WO(\d{4})(\d{6})".to_string(),
                r"publication[_\-]?number[=:]WO(\d{4})(\d{6})".to_string(),
            ],
            rule: MatchRule::YearSerial {
                min_year: 1990,
                max_year: None,
                serial_width: 6,
            },
        }
    }

    /// The Brazilian scheme: `BR` + 7 to 12 digits.
    pub fn br() -> Self {
        Self {
            office: "BR".to_string(),
            patterns: vec![
                r"BR[\s/\-]?(\d{7,12})".to_string(),
                r"/patent/BR(\d{7,12})".to_string(),
                r"patent[_\-]?id[=:]BR(\d{7,12})".to_string(),
                r"BR\s*[A-Z]?\s*(\d{7,12})".to_string(),
                r"publication[_\-]?number[=:]BR(\d{7,12})".to_string(),
            ],
            rule: MatchRule::DigitRun {
                min_digits: 7,
                max_digits: 12,
            },
        }
    }
}

/// A compiled identifier scheme: pattern table plus validator.
#[derive(Debug, Clone)]
pub struct IdentifierScheme {
    office: String,
    patterns: Vec<Regex>,
    rule: MatchRule,
}

impl IdentifierScheme {
    /// Compiles a scheme definition.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if a pattern does not compile or
    /// captures fewer groups than the rule needs.
    pub fn compile(definition: SchemeDefinition) -> FetchResult<Self> {
        let needed = match definition.rule {
            MatchRule::YearSerial { .. } => 2,
            MatchRule::DigitRun { .. } => 1,
        };

        let mut patterns = Vec::with_capacity(definition.patterns.len());
        for source in &definition.patterns {
            let regex = RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    FetchError::configuration(format!("invalid pattern '{source}': {e}"))
                })?;
            // captures_len counts the implicit whole-match group
            if regex.captures_len() - 1 < needed {
                return Err(FetchError::configuration(format!(
                    "pattern '{source}' needs {needed} capture group(s)"
                )));
            }
            patterns.push(regex);
        }

        Ok(Self {
            office: definition.office.to_ascii_uppercase(),
            patterns,
            rule: definition.rule,
        })
    }

    /// The built-in WO scheme.
    pub fn wo() -> Self {
        Self::builtin(SchemeDefinition::wo())
    }

    /// The built-in BR scheme.
    pub fn br() -> Self {
        Self::builtin(SchemeDefinition::br())
    }

    fn builtin(definition: SchemeDefinition) -> Self {
        let office = definition.office.clone();
        let rule = definition.rule.clone();
        match Self::compile(definition) {
            Ok(scheme) => scheme,
            Err(e) => {
                tracing::error!(office = %office, error = %e, "Built-in scheme failed to compile");
                Self {
                    office,
                    patterns: Vec::new(),
                    rule,
                }
            }
        }
    }

    /// Returns the office prefix.
    pub fn office(&self) -> &str {
        &self.office
    }

    /// Returns the number of recognition patterns.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Returns every valid, normalized identifier in `text`.
    ///
    /// Order follows the pattern table, then match position. Duplicates are
    /// kept; callers collect into a set. A capture that runs on into more
    /// digits is a truncated reading of a longer number and is dropped.
    pub fn find_all<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        self.patterns.iter().flat_map(move |regex| {
            regex
                .captures_iter(text)
                .filter_map(move |caps| {
                    let end = (1..caps.len()).rev().find_map(|i| caps.get(i))?.end();
                    if text[end..].starts_with(|c: char| c.is_ascii_digit()) {
                        return None;
                    }
                    let first = caps.get(1).map(|m| m.as_str())?;
                    let second = caps.get(2).map(|m| m.as_str());
                    self.normalize(first, second)
                })
        })
    }

    /// Validates and normalizes one set of captures.
    pub fn normalize(&self, first: &str, second: Option<&str>) -> Option<String> {
        match &self.rule {
            MatchRule::YearSerial {
                min_year,
                max_year,
                serial_width,
            } => {
                let year: i32 = first.parse().ok()?;
                let max_year = max_year.unwrap_or_else(|| chrono::Utc::now().year());
                if year < *min_year || year > max_year {
                    return None;
                }
                let serial = second?;
                if serial.is_empty() || serial.len() > *serial_width {
                    return None;
                }
                Some(format!(
                    "{}{year}{serial:0>width$}",
                    self.office,
                    width = *serial_width
                ))
            }
            MatchRule::DigitRun {
                min_digits,
                max_digits,
            } => {
                let digits = first;
                if !(*min_digits..=*max_digits).contains(&digits.len())
                    || !digits.bytes().all(|b| b.is_ascii_digit())
                {
                    return None;
                }
                Some(format!("{}{digits}", self.office))
            }
        }
    }
}
