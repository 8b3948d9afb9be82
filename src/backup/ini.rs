//! Minimal INI reader for the backman configuration file.
//!
//! Fields declared before the first `[section]` header land in the global section.
//! Lookups return every value of a field in file order so callers can enforce
//! multiplicity themselves.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use getset::Getters;
use std::path::Path;
use thiserror::Error;

const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n', '\x0c', '\x0b'];

#[derive(Error, Debug, PartialEq, Eq)]
enum FieldLineError {
    #[error("invalid character {0:?} in field name")]
    InvalidFieldChar(char),
    #[error("field must not be empty")]
    EmptyField,
    #[error("missing '='")]
    MissingEquals,
}

#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct IniField {
    field: String,
    value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct IniSection {
    /// Empty for the global section
    name: String,
    /// 1-based line of the header, 0 for the global section
    line: usize,
    fields: Vec<IniField>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IniData {
    sections: Vec<IniSection>,
}

fn is_valid_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_comment_or_empty(line: &str) -> bool {
    let line = line.trim_matches(WHITESPACE);
    line.is_empty() || line.starts_with(';') || line.starts_with('#')
}

fn parse_field_line(line: &str) -> std::result::Result<IniField, FieldLineError> {
    let line = line.trim_matches(WHITESPACE);

    let field_end = line
        .find(|c: char| c == ' ' || c == '\t' || c == '=')
        .unwrap_or(line.len());
    let field = &line[..field_end];
    if let Some(c) = field.chars().find(|c| !is_valid_field_char(*c)) {
        return Err(FieldLineError::InvalidFieldChar(c));
    }
    if field.is_empty() {
        return Err(FieldLineError::EmptyField);
    }

    let eq = line.find('=').ok_or(FieldLineError::MissingEquals)?;
    if !line[field_end..eq].trim_matches(WHITESPACE).is_empty() {
        return Err(FieldLineError::MissingEquals);
    }
    let raw_value = line[eq + 1..].trim_matches(WHITESPACE);

    let mut quote: Option<char> = None;
    let mut value = String::with_capacity(raw_value.len());
    for c in raw_value.chars() {
        match (c, quote) {
            ('\'' | '"', Some(q)) if q == c => quote = None,
            ('\'' | '"', None) => quote = Some(c),
            (' ' | '\t' | '#' | ';', None) => break,
            _ => value.push(c),
        }
    }

    Ok(IniField {
        field: field.to_owned(),
        value,
    })
}

/// Returns the section name if `line` is a header, warning about trailing text.
fn parse_header(line: &str, line_no: usize) -> Option<String> {
    let trimmed = line.trim_start_matches(WHITESPACE);
    let rest = trimmed.strip_prefix('[')?;
    let Some(end) = rest.find(']') else {
        tracing::warn!(
            "Missing closing bracket in section header at line {line_no}, ignoring line"
        );
        return None;
    };
    let name = rest[..end].trim_matches(WHITESPACE);
    if name.is_empty() {
        tracing::warn!("Empty section name at line {line_no}, ignoring line");
        return None;
    }
    if !is_comment_or_empty(&rest[end + 1..]) {
        tracing::warn!("Unknown text after section label at line {line_no}");
    }
    Some(name.to_owned())
}

impl IniSection {
    fn new(name: String, line: usize) -> Self {
        Self {
            name,
            line,
            fields: Vec::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.name.is_empty()
    }

    /// All values given for `field`, in file order.
    pub fn values(&self, field: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.field == field)
            .map(|f| f.value.as_str())
            .collect()
    }
}

impl IniData {
    pub fn parse(source: &str) -> IniData {
        let mut sections = vec![IniSection::new(String::new(), 0)];

        for (idx, line) in source.lines().enumerate() {
            let line_no = idx + 1;
            if is_comment_or_empty(line) {
                continue;
            }
            if line.trim_start_matches(WHITESPACE).starts_with('[') {
                if let Some(name) = parse_header(line, line_no) {
                    sections.push(IniSection::new(name, line_no));
                }
                continue;
            }
            match parse_field_line(line) {
                Ok(field) => {
                    if let Some(section) = sections.last_mut() {
                        section.fields.push(field);
                    }
                }
                Err(e) => tracing::warn!(
                    "Error \"{e}\" in INI parsing at line {line_no}. Ignoring line ({line:?})"
                ),
            }
        }

        IniData { sections }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<IniData> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path)?;
        Ok(Self::parse(&source))
    }

    pub fn global(&self) -> &IniSection {
        &self.sections[0]
    }

    /// Named sections in file order.
    pub fn sections(&self) -> impl Iterator<Item = &IniSection> {
        self.sections.iter().skip(1)
    }
}
