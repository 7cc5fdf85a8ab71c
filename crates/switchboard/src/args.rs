//! Argument schema and string-to-typed coercion.
//!
//! Commands declare their parameters as an ordered sequence of [`Arg`]s.
//! The order matters twice: positional string input is consumed
//! left-to-right against it, and usage strings print it as declared.
//!
//! Coercion happens per value at dispatch time via [`ArgKind::coerce`];
//! compatibility between a schema and a handler signature is checked once
//! at registration time (see [`crate::bind::BoundCommand::bind`]).

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Errors produced while converting raw string input into typed values.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A required argument had no input value and no declared default.
    #[error("missing required argument '{0}'")]
    Missing(String),

    /// The raw value could not be parsed as the declared kind.
    #[error("argument '{name}': cannot parse '{value}' as {kind}")]
    Parse {
        /// Declared argument name
        name: String,
        /// The offending raw input
        value: String,
        /// Label of the declared kind
        kind: &'static str,
    },

    /// A select argument received a value outside its option set.
    #[error("argument '{name}': '{value}' is not one of {options:?}")]
    NotAnOption {
        /// Declared argument name
        name: String,
        /// The offending raw input
        value: String,
        /// The declared option set
        options: Vec<String>,
    },

    /// More positional values were supplied than the schema declares.
    #[error("too many arguments: expected at most {expected}, got {given}")]
    TooMany {
        /// Number of declared arguments
        expected: usize,
        /// Number of supplied values
        given: usize,
    },
}

/// What a handler parameter accepts.
///
/// This is the closed set of native parameter types; the richer [`ArgKind`]
/// schema maps onto it (`Select` coerces to a string value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `String`
    Str,
    /// `i64`
    Int,
    /// `f64`
    Float,
    /// `bool`
    Bool,
    /// `serde_json::Value`
    Json,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParamKind::Str => "str",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::Json => "json",
        };
        f.write_str(label)
    }
}

/// Declared semantic type of one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    /// Passed through unchanged.
    Str,
    /// Decimal `i64`.
    Int,
    /// Decimal `f64`.
    Float,
    /// Case-insensitive `"true"` / `"false"`.
    Bool,
    /// Membership in a declared option set; coerces to a string value.
    Select(Vec<String>),
    /// Composite: the raw string is parsed as a JSON document.
    Json,
}

impl ArgKind {
    /// Short label used in usage strings and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ArgKind::Str => "str",
            ArgKind::Int => "int",
            ArgKind::Float => "float",
            ArgKind::Bool => "bool",
            ArgKind::Select(_) => "select",
            ArgKind::Json => "json",
        }
    }

    /// The native parameter kind this schema kind produces.
    pub fn param_kind(&self) -> ParamKind {
        match self {
            ArgKind::Str | ArgKind::Select(_) => ParamKind::Str,
            ArgKind::Int => ParamKind::Int,
            ArgKind::Float => ParamKind::Float,
            ArgKind::Bool => ParamKind::Bool,
            ArgKind::Json => ParamKind::Json,
        }
    }

    /// Coerces one raw string into a typed value.
    ///
    /// `name` is only used to report errors against the right argument.
    pub fn coerce(&self, name: &str, raw: &str) -> Result<ArgValue, ConvertError> {
        match self {
            ArgKind::Str => Ok(ArgValue::Str(raw.to_owned())),
            ArgKind::Int => raw.parse::<i64>().map(ArgValue::Int).map_err(|_| {
                ConvertError::Parse {
                    name: name.to_owned(),
                    value: raw.to_owned(),
                    kind: self.label(),
                }
            }),
            ArgKind::Float => raw.parse::<f64>().map(ArgValue::Float).map_err(|_| {
                ConvertError::Parse {
                    name: name.to_owned(),
                    value: raw.to_owned(),
                    kind: self.label(),
                }
            }),
            ArgKind::Bool => {
                if raw.eq_ignore_ascii_case("true") {
                    Ok(ArgValue::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Ok(ArgValue::Bool(false))
                } else {
                    Err(ConvertError::Parse {
                        name: name.to_owned(),
                        value: raw.to_owned(),
                        kind: self.label(),
                    })
                }
            }
            ArgKind::Json => {
                serde_json::from_str(raw)
                    .map(ArgValue::Json)
                    .map_err(|_| ConvertError::Parse {
                        name: name.to_owned(),
                        value: raw.to_owned(),
                        kind: self.label(),
                    })
            }
            ArgKind::Select(options) => {
                if options.iter().any(|option| option == raw) {
                    Ok(ArgValue::Str(raw.to_owned()))
                } else {
                    Err(ConvertError::NotAnOption {
                        name: name.to_owned(),
                        value: raw.to_owned(),
                        options: options.clone(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A coerced argument value, ready to hand to a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A string (from `Str` or `Select` schema kinds)
    Str(String),
    /// A decimal integer
    Int(i64),
    /// A decimal float
    Float(f64),
    /// A boolean
    Bool(bool),
    /// A parsed JSON document (from the composite `Json` schema kind)
    Json(Value),
}

impl ArgValue {
    /// The native kind of this value.
    pub fn kind(&self) -> ParamKind {
        match self {
            ArgValue::Str(_) => ParamKind::Str,
            ArgValue::Int(_) => ParamKind::Int,
            ArgValue::Float(_) => ParamKind::Float,
            ArgValue::Bool(_) => ParamKind::Bool,
            ArgValue::Json(_) => ParamKind::Json,
        }
    }
}

/// One declared argument: name, kind, optional description and default.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Name, unique within a command's schema.
    pub name: String,
    /// Declared semantic type.
    pub kind: ArgKind,
    /// Human description for usage output.
    pub description: Option<String>,
    /// Raw default, coerced like any input when the argument is missing.
    pub default: Option<String>,
}

impl Arg {
    /// Creates an argument with no description and no default.
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            default: None,
        }
    }

    /// Sets the human description.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Sets the raw default value.
    ///
    /// Defaults go through the same coercion as supplied input, so an
    /// unparseable default surfaces as a conversion error at call time.
    pub fn default_value(mut self, raw: impl Into<String>) -> Self {
        self.default = Some(raw.into());
        self
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}:{}>", self.name, self.kind.label())
    }
}

/// Renders a schema as a usage fragment, e.g. `<name:str> <count:int>`.
pub fn usage(args: &[Arg]) -> String {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_passthrough() {
        let value = ArgKind::Str.coerce("name", "anything at all").unwrap();
        assert_eq!(value, ArgValue::Str("anything at all".into()));
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(
            ArgKind::Int.coerce("n", "-42").unwrap(),
            ArgValue::Int(-42)
        );
        let err = ArgKind::Int.coerce("n", "4.5").unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Parse { ref name, ref value, kind: "int" }
                if name == "n" && value == "4.5"
        ));
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(
            ArgKind::Float.coerce("x", "2.75").unwrap(),
            ArgValue::Float(2.75)
        );
        assert!(ArgKind::Float.coerce("x", "two").is_err());
    }

    #[test]
    fn test_bool_coercion_case_insensitive() {
        for raw in ["true", "TRUE", "True"] {
            assert_eq!(
                ArgKind::Bool.coerce("flag", raw).unwrap(),
                ArgValue::Bool(true)
            );
        }
        for raw in ["false", "FALSE", "False"] {
            assert_eq!(
                ArgKind::Bool.coerce("flag", raw).unwrap(),
                ArgValue::Bool(false)
            );
        }
    }

    #[test]
    fn test_bool_rejects_other_strings() {
        for raw in ["1", "0", "yes", "no", ""] {
            assert!(ArgKind::Bool.coerce("flag", raw).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn test_json_coercion() {
        let value = ArgKind::Json.coerce("payload", r#"{"n": 1}"#).unwrap();
        assert_eq!(value, ArgValue::Json(serde_json::json!({"n": 1})));
        // Bare scalars are valid JSON documents too.
        assert_eq!(
            ArgKind::Json.coerce("payload", "3").unwrap(),
            ArgValue::Json(serde_json::json!(3))
        );
        assert!(ArgKind::Json.coerce("payload", "{broken").is_err());
    }

    #[test]
    fn test_select_membership() {
        let kind = ArgKind::Select(vec!["red".into(), "green".into()]);
        assert_eq!(
            kind.coerce("color", "green").unwrap(),
            ArgValue::Str("green".into())
        );
        let err = kind.coerce("color", "blue").unwrap_err();
        assert!(matches!(err, ConvertError::NotAnOption { .. }));
        assert!(err.to_string().contains("blue"));
    }

    #[test]
    fn test_select_param_kind_is_str() {
        let kind = ArgKind::Select(vec!["a".into()]);
        assert_eq!(kind.param_kind(), ParamKind::Str);
    }

    #[test]
    fn test_usage_rendering() {
        let args = vec![
            Arg::new("name", ArgKind::Str),
            Arg::new("count", ArgKind::Int).default_value("1"),
        ];
        assert_eq!(usage(&args), "<name:str> <count:int>");
        assert_eq!(usage(&[]), "");
    }

    #[test]
    fn test_arg_builder() {
        let arg = Arg::new("mode", ArgKind::Select(vec!["fast".into(), "slow".into()]))
            .describe("execution mode")
            .default_value("fast");
        assert_eq!(arg.description.as_deref(), Some("execution mode"));
        assert_eq!(arg.default.as_deref(), Some("fast"));
        assert_eq!(arg.to_string(), "<mode:select>");
    }
}
