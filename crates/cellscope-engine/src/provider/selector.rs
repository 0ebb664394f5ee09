//! Parser names and selectors.
//!
//! A selector is a parser name followed by optional text. The text is either
//! a parenthesized value list (`parser3("Value3", 2)`) or a raw pattern
//! (`date-parse-pattern %Y-%m-%d`).

use std::fmt;

use super::error::{ProviderError, Result};
use crate::engine::{Value, format_number};

const MAX_NAME_LENGTH: usize = 255;

/// Lowercase letters, digits and `-`, starting with a letter.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ParserName(String);

impl ParserName {
    pub fn new(name: &str) -> Result<ParserName> {
        if Self::is_valid(name) {
            Ok(ParserName(name.to_string()))
        } else {
            Err(ProviderError::InvalidName(name.to_string()))
        }
    }

    pub fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        chars.next().is_some_and(|c| c.is_ascii_lowercase())
            && name.len() <= MAX_NAME_LENGTH
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ParserSelector {
    name: ParserName,
    text: String,
}

impl ParserSelector {
    pub fn new(name: ParserName, text: &str) -> ParserSelector {
        ParserSelector {
            name,
            text: text.trim().to_string(),
        }
    }

    /// A selector carrying `values` as a parenthesized list.
    pub fn with_values(name: ParserName, values: &[Value]) -> ParserSelector {
        if values.is_empty() {
            return ParserSelector::new(name, "");
        }
        ParserSelector {
            name,
            text: format_values(values),
        }
    }

    /// Parse `name`, `name pattern` or `name(values)`.
    pub fn parse(text: &str) -> Result<ParserSelector> {
        let text = text.trim();
        let end = text
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(text.len());
        let (name, rest) = text.split_at(end);
        if !rest.is_empty() && !rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
            return Err(ProviderError::InvalidSelector(text.to_string()));
        }
        let name = ParserName::new(name)
            .map_err(|_| ProviderError::InvalidSelector(text.to_string()))?;
        let selector = ParserSelector::new(name, rest);
        if selector.has_value_list() {
            selector.values()?;
        }
        Ok(selector)
    }

    pub fn name(&self) -> &ParserName {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The same text under a different parser name.
    pub fn renamed(&self, name: ParserName) -> ParserSelector {
        ParserSelector {
            name,
            text: self.text.clone(),
        }
    }

    fn has_value_list(&self) -> bool {
        self.text.starts_with('(')
    }

    /// The values this selector carries: the parenthesized list, the raw
    /// pattern as a single text value, or nothing.
    pub fn values(&self) -> Result<Vec<Value>> {
        if self.text.is_empty() {
            Ok(Vec::new())
        } else if self.has_value_list() {
            parse_values(&self.text).map_err(|message| ProviderError::InvalidValues {
                name: self.name.to_string(),
                message,
            })
        } else {
            Ok(vec![Value::text(self.text.as_str())])
        }
    }
}

impl fmt::Display for ParserSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "{}", self.name)
        } else if self.has_value_list() {
            write!(f, "{}{}", self.name, self.text)
        } else {
            write!(f, "{} {}", self.name, self.text)
        }
    }
}

/// Parse `("text", 1.5, TRUE)`.
pub fn parse_values(text: &str) -> std::result::Result<Vec<Value>, String> {
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| format!("expected a parenthesized list, got {}", text))?;

    let chars: Vec<char> = inner.chars().collect();
    let mut values = Vec::new();
    let mut i = 0usize;

    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            if !values.is_empty() {
                return Err("trailing comma".to_string());
            }
            break;
        }

        if chars[i] == '"' {
            i += 1;
            let mut s = String::new();
            let mut closed = false;
            while i < chars.len() {
                match chars[i] {
                    '\\' if i + 1 < chars.len() => {
                        s.push(chars[i + 1]);
                        i += 2;
                    }
                    '"' => {
                        closed = true;
                        i += 1;
                        break;
                    }
                    c => {
                        s.push(c);
                        i += 1;
                    }
                }
            }
            if !closed {
                return Err("unterminated string".to_string());
            }
            values.push(Value::Text(s));
        } else {
            let start = i;
            while i < chars.len() && chars[i] != ',' {
                i += 1;
            }
            let token: String = chars[start..i].iter().collect();
            values.push(literal(token.trim())?);
        }

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        if chars[i] != ',' {
            return Err(format!("unexpected '{}'", chars[i]));
        }
        i += 1;
    }

    Ok(values)
}

fn literal(token: &str) -> std::result::Result<Value, String> {
    if token.eq_ignore_ascii_case("true") {
        return Ok(Value::Boolean(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Ok(Value::Boolean(false));
    }
    token
        .parse::<f64>()
        .map(Value::Number)
        .map_err(|_| format!("invalid value {}", token))
}

/// Format values as a parenthesized list `parse_values` reads back.
pub fn format_values(values: &[Value]) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|value| match value {
            Value::Number(n) if n.fract() == 0.0 => format_number(*n),
            Value::Number(n) => n.to_string(),
            Value::Boolean(b) => Value::Boolean(*b).to_string(),
            other => format!(
                "\"{}\"",
                other.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            ),
        })
        .collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(text: &str) -> ParserName {
        ParserName::new(text).unwrap()
    }

    #[test]
    fn test_parser_name_rules() {
        assert!(ParserName::is_valid("date-parse-pattern"));
        assert!(ParserName::is_valid("parser3"));
        assert!(!ParserName::is_valid("Parser3"));
        assert!(!ParserName::is_valid("3parser"));
        assert!(!ParserName::is_valid("with space"));
        assert!(!ParserName::is_valid(""));
    }

    #[test]
    fn test_selector_with_pattern() {
        let selector = ParserSelector::parse("date-parse-pattern %Y-%m-%d").unwrap();
        assert_eq!(selector.name(), &name("date-parse-pattern"));
        assert_eq!(selector.text(), "%Y-%m-%d");
        assert_eq!(selector.values().unwrap(), vec![Value::text("%Y-%m-%d")]);
        assert_eq!(selector.to_string(), "date-parse-pattern %Y-%m-%d");
    }

    #[test]
    fn test_selector_with_value_list() {
        let selector = ParserSelector::parse("parser3(\"Value3\", 2, true)").unwrap();
        assert_eq!(selector.name(), &name("parser3"));
        assert_eq!(
            selector.values().unwrap(),
            vec![
                Value::text("Value3"),
                Value::Number(2.0),
                Value::Boolean(true)
            ]
        );
        assert_eq!(selector.to_string(), "parser3(\"Value3\", 2, true)");
    }

    #[test]
    fn test_selector_name_only() {
        let selector = ParserSelector::parse("text").unwrap();
        assert_eq!(selector.text(), "");
        assert!(selector.values().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(ParserSelector::parse("").is_err());
        assert!(ParserSelector::parse("Bad").is_err());
        assert!(ParserSelector::parse("parser3(\"open").is_err());
        assert!(ParserSelector::parse("parser3(1,)").is_err());
        assert!(ParserSelector::parse("parser3(abc)").is_err());
    }

    #[test]
    fn test_values_with_escapes_and_commas() {
        assert_eq!(
            parse_values(r#"(",", "say \"hi\"")"#).unwrap(),
            vec![Value::text(","), Value::text("say \"hi\"")]
        );
        assert_eq!(parse_values("()").unwrap(), vec![]);
    }

    #[test]
    fn test_with_values_formats_a_list() {
        let selector = ParserSelector::with_values(
            name("number-parse-pattern"),
            &[Value::text("."), Value::text(",")],
        );
        assert_eq!(selector.to_string(), "number-parse-pattern(\".\", \",\")");
        assert_eq!(
            selector.values().unwrap(),
            vec![Value::text("."), Value::text(",")]
        );
    }
}
