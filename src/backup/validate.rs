//! Field extraction and validation for configuration values.
//!
//! Every scalar config field goes through [`optional_scalar`], which rejects
//! duplicate definitions instead of silently picking one.

use crate::backup::env_path::resolve_path_with_environment;
use crate::backup::ini::IniSection;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::PathBuf;
use std::result;

/// Parses a field value. Receives the field name for error reporting.
pub type FieldParser<T> = fn(&'static str, &str) -> Result<T>;

/// Zero or one value for `field`; more than one is an error.
pub fn optional_scalar<T>(
    section: &IniSection,
    field: &'static str,
    parse: FieldParser<T>,
) -> Result<Option<T>> {
    match section.values(field).as_slice() {
        [] => Ok(None),
        [value] => parse(field, value).map(Some),
        values => Err(Error::DuplicateField {
            field,
            count: values.len(),
        }),
    }
}

/// Zero or one value for `field`, falling back to `default`.
pub fn scalar_or<T, D: FnOnce() -> T>(
    section: &IniSection,
    field: &'static str,
    default: D,
    parse: FieldParser<T>,
) -> Result<T> {
    let value = optional_scalar(section, field, parse)?;
    Ok(value.unwrap_or_else(default))
}

/// Exactly one value for `field`.
pub fn required_scalar<T>(
    section: &IniSection,
    field: &'static str,
    parse: FieldParser<T>,
) -> Result<T> {
    match section.values(field).as_slice() {
        [value] => parse(field, value),
        values => Err(Error::RequiredField {
            field,
            count: values.len(),
        }),
    }
}

/// Every value of a multi-valued field.
pub fn multi_value(section: &IniSection, field: &str) -> Vec<String> {
    section
        .values(field)
        .into_iter()
        .map(str::to_owned)
        .collect()
}

pub fn parse_string(_field: &'static str, value: &str) -> Result<String> {
    Ok(value.to_owned())
}

pub fn parse_path(_field: &'static str, value: &str) -> Result<PathBuf> {
    Ok(resolve_path_with_environment(value))
}

pub fn parse_bool(field: &'static str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::InvalidValue {
            field,
            value: value.to_owned(),
            expected: "bool",
        }),
    }
}

pub fn parse_int(field: &'static str, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| Error::InvalidValue {
        field,
        value: value.to_owned(),
        expected: "an integer",
    })
}

pub fn validate_valid_archive_base_name<S: AsRef<str>>(
    name: S,
) -> result::Result<(), ValidationError> {
    if !is_sanitized(name.as_ref()) {
        return Err(ValidationError::new("InvalidArchiveBaseName").with_message(
            format!(
                "Invalid file name, try sanitizing like {:?}",
                sanitize(name)
            )
            .into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::ini::IniData;

    fn section(source: &str) -> IniSection {
        IniData::parse(source).global().clone()
    }

    #[test]
    fn test_optional_scalar() {
        let s = section("dest = /a\n");
        assert_eq!(
            optional_scalar(&s, "dest", parse_string).unwrap(),
            Some("/a".to_owned())
        );
        assert_eq!(optional_scalar(&s, "other", parse_string).unwrap(), None);
    }

    #[test]
    fn test_optional_scalar_duplicate_is_error() {
        let s = section("dest = /a\ndest = /b\n");
        match optional_scalar(&s, "dest", parse_string) {
            Err(Error::DuplicateField { field, count }) => {
                assert_eq!(field, "dest");
                assert_eq!(count, 2);
            }
            other => panic!("Expected DuplicateField, got {other:?}"),
        }
    }

    #[test]
    fn test_scalar_or_default() {
        let s = section("");
        let value = scalar_or(&s, "one_file_system", || true, parse_bool);
        assert!(value.unwrap());
        let s = section("one_file_system = FALSE\n");
        let value = scalar_or(&s, "one_file_system", || true, parse_bool);
        assert!(!value.unwrap());
    }

    #[test]
    fn test_required_scalar_counts() {
        let s = section("");
        assert!(matches!(
            required_scalar(&s, "path", parse_path),
            Err(Error::RequiredField { field: "path", count: 0 })
        ));
        let s = section("path = /a\npath = /b\npath = /c\n");
        assert!(matches!(
            required_scalar(&s, "path", parse_path),
            Err(Error::RequiredField { field: "path", count: 3 })
        ));
        let s = section("path = /a\n");
        assert_eq!(
            required_scalar(&s, "path", parse_path).unwrap(),
            PathBuf::from("/a")
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("encrypt", "True").unwrap());
        assert!(!parse_bool("encrypt", "false").unwrap());
        match parse_bool("encrypt", "yes") {
            Err(Error::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "encrypt");
                assert_eq!(value, "yes");
            }
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("jobs", "4").unwrap(), 4);
        assert_eq!(parse_int("jobs", "-1").unwrap(), -1);
        assert!(parse_int("jobs", "four").is_err());
    }

    #[test]
    fn test_multi_value_keeps_order_and_duplicates() {
        let s = section("exclude = /a\nexclude = /b\nexclude = /a\n");
        assert_eq!(multi_value(&s, "exclude"), vec!["/a", "/b", "/a"]);
    }

    #[test]
    fn test_validate_valid_archive_base_name() {
        assert!(validate_valid_archive_base_name("home").is_ok());
        assert!(validate_valid_archive_base_name("home/user").is_err());
    }
}
