//! Tunable engine parameters.
//!
//! Engines declare their options during the handshake with lines like
//!
//! ```text
//! option name Search Depth type spin default 4 min 1 max 12
//! option name Style type combo default Balanced var Aggressive var Balanced var Solid
//! ```
//!
//! The grammar is a flat keyword scan: each of `name`, `type`,
//! `default`, `min`, `max` and `var` starts a field whose value runs up
//! to the next keyword or the end of the line. Keywords are matched
//! case-insensitively; names and values keep their case and may contain
//! spaces.

use std::collections::BTreeSet;
use thiserror::Error;

use cfp_types::ErrorCode;

/// Errors from parsing or updating an [`EngineOption`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// The description has no `type` field.
    #[error("option description has no type")]
    MissingKind,

    /// The `type` field names an unknown shape.
    #[error("unknown option type '{0}'")]
    UnknownKind(String),

    /// A field required by the shape is absent.
    #[error("{kind} option is missing its {field} field")]
    MissingField {
        /// Shape keyword, e.g. `spin`.
        kind: &'static str,
        /// Missing field keyword, e.g. `min`.
        field: &'static str,
    },

    /// A field value does not parse as the type the shape requires.
    #[error("'{value}' is not a valid {expected} for option '{name}'")]
    TypeMismatch {
        /// Option name.
        name: String,
        /// What the field should have been, e.g. `integer`.
        expected: &'static str,
        /// The offending text.
        value: String,
    },

    /// Spin bounds do not satisfy `min <= default <= max`.
    #[error("spin option '{name}' has default {value} outside {min}..={max}")]
    OutOfRange {
        /// Option name.
        name: String,
        min: i64,
        max: i64,
        value: i64,
    },

    /// A combo default (or update) is not one of the declared variants.
    #[error("'{value}' is not a variant of option '{name}'")]
    NotInVariants {
        /// Option name.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// A combo declared fewer than two variants.
    #[error("combo option '{0}' needs at least two variants")]
    TooFewVariants(String),
}

impl ErrorCode for OptionError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingKind => "PROTO_MISSING_KIND",
            Self::UnknownKind(_) => "PROTO_UNKNOWN_KIND",
            Self::MissingField { .. } => "PROTO_MISSING_FIELD",
            Self::TypeMismatch { .. } => "PROTO_TYPE_MISMATCH",
            Self::OutOfRange { .. } => "PROTO_VALUE_OUT_OF_RANGE",
            Self::NotInVariants { .. } => "PROTO_VALUE_NOT_IN_VARIANTS",
            Self::TooFewVariants(_) => "PROTO_TOO_FEW_VARIANTS",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A caller can pick a different value for these two.
        matches!(self, Self::NotInVariants { .. } | Self::TypeMismatch { .. })
    }
}

/// A tunable engine parameter.
///
/// The five shapes mirror the wire `type` keyword. Every shape carries
/// the human-readable name the engine declared; `value` always holds
/// the *current* setting (the declared default until someone changes
/// it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOption {
    /// A boolean toggle.
    Check {
        /// Declared option name.
        name: String,
        /// Current setting.
        value: bool,
    },
    /// An integer confined to an inclusive range.
    Spin {
        /// Declared option name.
        name: String,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
        /// Current setting, always within `min..=max`.
        value: i64,
    },
    /// A string drawn from a declared set of variants.
    Combo {
        /// Declared option name.
        name: String,
        /// Declared variants, at least two.
        vars: BTreeSet<String>,
        /// Current setting, always a member of `vars`.
        value: String,
    },
    /// A trigger with no value.
    Button {
        /// Declared option name.
        name: String,
    },
    /// An unrestricted string.
    Text {
        /// Declared option name.
        name: String,
        /// Current setting.
        value: String,
    },
}

impl EngineOption {
    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Check { name, .. }
            | Self::Spin { name, .. }
            | Self::Combo { name, .. }
            | Self::Button { name }
            | Self::Text { name, .. } => name,
        }
    }

    /// Returns the wire `type` keyword for this shape.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Check { .. } => "check",
            Self::Spin { .. } => "spin",
            Self::Combo { .. } => "combo",
            Self::Button { .. } => "button",
            Self::Text { .. } => "string",
        }
    }

    /// Parses an `option` description from its tokens (everything after
    /// the leading `option` keyword).
    ///
    /// # Errors
    ///
    /// Any missing or inconsistent field yields an [`OptionError`];
    /// per the transport rules the driver drops such descriptions
    /// silently rather than failing the handshake.
    pub fn parse(tokens: &[&str]) -> Result<Self, OptionError> {
        let fields = extract_fields(tokens);
        let kind = fields
            .iter()
            .find(|(kw, _)| kw == "type")
            .map(|(_, v)| v.as_str())
            .ok_or(OptionError::MissingKind)?;

        match kind.to_ascii_lowercase().as_str() {
            "check" => parse_check(&fields),
            "spin" => parse_spin(&fields),
            "combo" => parse_combo(&fields),
            "button" => parse_button(&fields),
            "string" => parse_text(&fields),
            other => Err(OptionError::UnknownKind(other.to_string())),
        }
    }

    /// Returns the `type ...` clause used when describing this option
    /// to observers.
    ///
    /// Combo variants are listed in lexical order so the description is
    /// stable across runs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Check { value, .. } => format!("type check value {value}"),
            Self::Spin {
                min, max, value, ..
            } => format!("type spin min {min} max {max} value {value}"),
            Self::Combo { vars, value, .. } => {
                let vars: Vec<&str> = vars.iter().map(String::as_str).collect();
                format!("type combo value {value} var {}", vars.join(" var "))
            }
            Self::Button { .. } => "type button".to_string(),
            Self::Text { value, .. } => format!("type string value {value}"),
        }
    }

    /// Returns the value clause of a `setoption` command, including the
    /// leading space. Buttons carry no value and yield an empty clause.
    #[must_use]
    pub fn set_clause(&self) -> String {
        match self {
            Self::Check { value, .. } => format!(" value {value}"),
            Self::Spin { value, .. } => format!(" value {value}"),
            Self::Combo { value, .. } => format!(" value {value}"),
            Self::Button { .. } => String::new(),
            Self::Text { value, .. } => format!(" value {value}"),
        }
    }

    /// Applies an observer-supplied textual value to a copy of this
    /// option, returning the updated option together with the canonical
    /// value text that was applied.
    ///
    /// Spins are clamped into their declared range; the canonical text
    /// reflects the clamped value. Buttons ignore the input and yield
    /// an empty canonical text (button triggers carry no value).
    ///
    /// # Errors
    ///
    /// - [`OptionError::TypeMismatch`] for non-boolean check input or
    ///   non-integer spin input
    /// - [`OptionError::NotInVariants`] for combo input outside the
    ///   declared set
    pub fn with_value(&self, raw: &str) -> Result<(Self, String), OptionError> {
        match self {
            Self::Check { name, .. } => {
                let value = match raw {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(OptionError::TypeMismatch {
                            name: name.clone(),
                            expected: "boolean",
                            value: raw.to_string(),
                        })
                    }
                };
                let updated = Self::Check {
                    name: name.clone(),
                    value,
                };
                Ok((updated, value.to_string()))
            }
            Self::Spin {
                name, min, max, ..
            } => {
                let parsed: i64 = raw.parse().map_err(|_| OptionError::TypeMismatch {
                    name: name.clone(),
                    expected: "integer",
                    value: raw.to_string(),
                })?;
                let value = parsed.clamp(*min, *max);
                let updated = Self::Spin {
                    name: name.clone(),
                    min: *min,
                    max: *max,
                    value,
                };
                Ok((updated, value.to_string()))
            }
            Self::Combo { name, vars, .. } => {
                if !vars.contains(raw) {
                    return Err(OptionError::NotInVariants {
                        name: name.clone(),
                        value: raw.to_string(),
                    });
                }
                let updated = Self::Combo {
                    name: name.clone(),
                    vars: vars.clone(),
                    value: raw.to_string(),
                };
                Ok((updated, raw.to_string()))
            }
            Self::Button { .. } => Ok((self.clone(), String::new())),
            Self::Text { name, .. } => {
                let updated = Self::Text {
                    name: name.clone(),
                    value: raw.to_string(),
                };
                Ok((updated, raw.to_string()))
            }
        }
    }
}

/// One `keyword value...` field extracted from an option description.
type Field = (String, String);

/// Groups tokens into keyword/value fields.
///
/// Every occurrence of a known keyword opens a field; its value is the
/// join of the tokens up to the next keyword or the end. Keywords are
/// lowercased, values are preserved as written.
fn extract_fields(tokens: &[&str]) -> Vec<Field> {
    const KEYWORDS: [&str; 6] = ["name", "type", "default", "min", "max", "var"];

    let starts: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| KEYWORDS.iter().any(|kw| t.eq_ignore_ascii_case(kw)))
        .map(|(i, _)| i)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(tokens.len());
            (
                tokens[start].to_ascii_lowercase(),
                tokens[start + 1..end].join(" "),
            )
        })
        .collect()
}

fn field<'a>(fields: &'a [Field], keyword: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(kw, _)| kw == keyword)
        .map(|(_, v)| v.as_str())
}

fn required<'a>(
    fields: &'a [Field],
    kind: &'static str,
    keyword: &'static str,
) -> Result<&'a str, OptionError> {
    field(fields, keyword).ok_or(OptionError::MissingField {
        kind,
        field: keyword,
    })
}

fn parse_int(name: &str, raw: &str) -> Result<i64, OptionError> {
    raw.parse().map_err(|_| OptionError::TypeMismatch {
        name: name.to_string(),
        expected: "integer",
        value: raw.to_string(),
    })
}

fn parse_check(fields: &[Field]) -> Result<EngineOption, OptionError> {
    let name = required(fields, "check", "name")?.to_string();
    let default = required(fields, "check", "default")?;
    let value = match default {
        "true" => true,
        "false" => false,
        other => {
            return Err(OptionError::TypeMismatch {
                name,
                expected: "boolean",
                value: other.to_string(),
            })
        }
    };
    Ok(EngineOption::Check { name, value })
}

fn parse_spin(fields: &[Field]) -> Result<EngineOption, OptionError> {
    let name = required(fields, "spin", "name")?.to_string();
    let min = parse_int(&name, required(fields, "spin", "min")?)?;
    let max = parse_int(&name, required(fields, "spin", "max")?)?;
    let value = parse_int(&name, required(fields, "spin", "default")?)?;
    if min > value || value > max {
        return Err(OptionError::OutOfRange {
            name,
            min,
            max,
            value,
        });
    }
    Ok(EngineOption::Spin {
        name,
        min,
        max,
        value,
    })
}

fn parse_combo(fields: &[Field]) -> Result<EngineOption, OptionError> {
    let name = required(fields, "combo", "name")?.to_string();
    let value = required(fields, "combo", "default")?.to_string();
    let vars: BTreeSet<String> = fields
        .iter()
        .filter(|(kw, _)| kw == "var")
        .map(|(_, v)| v.clone())
        .collect();
    if vars.len() < 2 {
        return Err(OptionError::TooFewVariants(name));
    }
    if !vars.contains(&value) {
        return Err(OptionError::NotInVariants { name, value });
    }
    Ok(EngineOption::Combo { name, vars, value })
}

fn parse_button(fields: &[Field]) -> Result<EngineOption, OptionError> {
    let name = required(fields, "button", "name")?.to_string();
    Ok(EngineOption::Button { name })
}

fn parse_text(fields: &[Field]) -> Result<EngineOption, OptionError> {
    let name = required(fields, "string", "name")?.to_string();
    let value = required(fields, "string", "default")?.to_string();
    Ok(EngineOption::Text { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfp_types::assert_error_codes;

    fn tokens(line: &str) -> Vec<&str> {
        line.split_whitespace().collect()
    }

    #[test]
    fn parse_spin_description() {
        let opt = EngineOption::parse(&tokens(
            "name Search Depth type spin default 4 min 1 max 12",
        ))
        .unwrap();
        assert_eq!(
            opt,
            EngineOption::Spin {
                name: "Search Depth".into(),
                min: 1,
                max: 12,
                value: 4,
            }
        );
        assert_eq!(opt.kind(), "spin");
    }

    #[test]
    fn parse_keywords_case_insensitively() {
        let opt =
            EngineOption::parse(&tokens("NAME Ponder TYPE check DEFAULT false")).unwrap();
        assert_eq!(
            opt,
            EngineOption::Check {
                name: "Ponder".into(),
                value: false,
            }
        );
    }

    #[test]
    fn parse_combo_collects_variants() {
        let opt = EngineOption::parse(&tokens(
            "name Style type combo default Balanced var Aggressive var Balanced var Solid",
        ))
        .unwrap();
        let EngineOption::Combo { vars, value, .. } = &opt else {
            panic!("expected combo, got {opt:?}");
        };
        assert_eq!(value, "Balanced");
        assert_eq!(vars.len(), 3);
        assert!(vars.contains("Solid"));
    }

    #[test]
    fn parse_button_needs_only_a_name() {
        let opt = EngineOption::parse(&tokens("name Clear Hash type button")).unwrap();
        assert_eq!(
            opt,
            EngineOption::Button {
                name: "Clear Hash".into()
            }
        );
    }

    #[test]
    fn parse_rejects_incomplete_descriptions() {
        assert_eq!(
            EngineOption::parse(&tokens("name Depth type spin default 4 min 1")),
            Err(OptionError::MissingField {
                kind: "spin",
                field: "max"
            })
        );
        assert_eq!(
            EngineOption::parse(&tokens("name Ponder default true")),
            Err(OptionError::MissingKind)
        );
        assert_eq!(
            EngineOption::parse(&tokens("name X type dial default 3")),
            Err(OptionError::UnknownKind("dial".into()))
        );
    }

    #[test]
    fn parse_rejects_default_outside_spin_range() {
        let err =
            EngineOption::parse(&tokens("name Depth type spin default 20 min 1 max 12"))
                .unwrap_err();
        assert!(matches!(err, OptionError::OutOfRange { value: 20, .. }));
    }

    #[test]
    fn parse_rejects_combo_default_outside_variants() {
        let err = EngineOption::parse(&tokens(
            "name Style type combo default Wild var Calm var Solid",
        ))
        .unwrap_err();
        assert!(matches!(err, OptionError::NotInVariants { .. }));
    }

    #[test]
    fn parse_rejects_single_variant_combo() {
        let err = EngineOption::parse(&tokens("name Style type combo default A var A"))
            .unwrap_err();
        assert_eq!(err, OptionError::TooFewVariants("Style".into()));
    }

    #[test]
    fn describe_matches_wire_format() {
        let spin = EngineOption::Spin {
            name: "Depth".into(),
            min: 0,
            max: 10,
            value: 1,
        };
        assert_eq!(spin.describe(), "type spin min 0 max 10 value 1");

        let combo = EngineOption::Combo {
            name: "Style".into(),
            vars: ["A", "B", "C"].into_iter().map(String::from).collect(),
            value: "B".into(),
        };
        assert_eq!(combo.describe(), "type combo value B var A var B var C");

        let button = EngineOption::Button { name: "Go".into() };
        assert_eq!(button.describe(), "type button");
    }

    #[test]
    fn set_clause_omits_button_value() {
        let button = EngineOption::Button { name: "Go".into() };
        assert_eq!(button.set_clause(), "");

        let check = EngineOption::Check {
            name: "Ponder".into(),
            value: true,
        };
        assert_eq!(check.set_clause(), " value true");
    }

    #[test]
    fn with_value_clamps_spins() {
        let spin = EngineOption::Spin {
            name: "Depth".into(),
            min: 1,
            max: 12,
            value: 4,
        };
        let (updated, text) = spin.with_value("40").unwrap();
        assert_eq!(text, "12");
        assert!(matches!(updated, EngineOption::Spin { value: 12, .. }));

        let (updated, text) = spin.with_value("-3").unwrap();
        assert_eq!(text, "1");
        assert!(matches!(updated, EngineOption::Spin { value: 1, .. }));
    }

    #[test]
    fn with_value_rejects_bad_input() {
        let spin = EngineOption::Spin {
            name: "Depth".into(),
            min: 1,
            max: 12,
            value: 4,
        };
        assert!(matches!(
            spin.with_value("deep"),
            Err(OptionError::TypeMismatch { .. })
        ));

        let combo = EngineOption::Combo {
            name: "Style".into(),
            vars: ["A", "B", "C"].into_iter().map(String::from).collect(),
            value: "B".into(),
        };
        assert_eq!(
            combo.with_value("D"),
            Err(OptionError::NotInVariants {
                name: "Style".into(),
                value: "D".into(),
            })
        );
        let (updated, text) = combo.with_value("C").unwrap();
        assert_eq!(text, "C");
        assert!(matches!(updated, EngineOption::Combo { ref value, .. } if value == "C"));
    }

    #[test]
    fn with_value_on_button_is_a_no_op() {
        let button = EngineOption::Button { name: "Go".into() };
        let (updated, text) = button.with_value("ignored").unwrap();
        assert_eq!(updated, button);
        assert_eq!(text, "");
    }

    #[test]
    fn error_codes_are_well_formed() {
        assert_error_codes(
            &[
                OptionError::MissingKind,
                OptionError::UnknownKind("x".into()),
                OptionError::MissingField {
                    kind: "spin",
                    field: "min",
                },
                OptionError::TypeMismatch {
                    name: "x".into(),
                    expected: "integer",
                    value: "y".into(),
                },
                OptionError::OutOfRange {
                    name: "x".into(),
                    min: 0,
                    max: 1,
                    value: 9,
                },
                OptionError::NotInVariants {
                    name: "x".into(),
                    value: "y".into(),
                },
                OptionError::TooFewVariants("x".into()),
            ],
            "PROTO_",
        );
    }
}
