//! Parsers that ship with the engine.
//!
//! Conventions:
//! - Patterns are chrono format strings (`%Y-%m-%d`); several patterns may be
//!   given and are tried in order.
//! - `number-parse-pattern` takes an optional grouping separator and an
//!   optional decimal separator (defaults `,` and `.`).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;

use super::error::{ProviderError, Result};
use super::info::{ParserInfo, ParserInfoSet};
use super::selector::{ParserName, ParserSelector};
use super::{SpreadsheetParser, SpreadsheetParserProvider};
use crate::engine::Value;

/// URL prefix of the built-in parser infos.
pub const PARSER_URL_BASE: &str = "https://cellscope.dev/parser/";

const DATE: &str = "date-parse-pattern";
const DATE_TIME: &str = "date-time-parse-pattern";
const TIME: &str = "time-parse-pattern";
const NUMBER: &str = "number-parse-pattern";
const TEXT: &str = "text";

const NAMES: &[&str] = &[DATE, DATE_TIME, TIME, NUMBER, TEXT];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PatternKind {
    Date,
    DateTime,
    Time,
}

#[derive(Debug)]
struct PatternParser {
    selector: ParserSelector,
    kind: PatternKind,
    patterns: Vec<String>,
}

impl SpreadsheetParser for PatternParser {
    fn selector(&self) -> &ParserSelector {
        &self.selector
    }

    fn parse(&self, text: &str) -> Result<Value> {
        let text = text.trim();
        for pattern in &self.patterns {
            let parsed = match self.kind {
                PatternKind::Date => NaiveDate::parse_from_str(text, pattern).map(Value::Date),
                PatternKind::DateTime => {
                    NaiveDateTime::parse_from_str(text, pattern).map(Value::DateTime)
                }
                PatternKind::Time => NaiveTime::parse_from_str(text, pattern).map(Value::Time),
            };
            if let Ok(value) = parsed {
                return Ok(value);
            }
        }
        Err(ProviderError::Parse {
            parser: self.selector.to_string(),
            text: text.to_string(),
            message: format!("no pattern matched ({})", self.patterns.join(", ")),
        })
    }
}

#[derive(Debug)]
struct NumberParser {
    selector: ParserSelector,
    grouping: String,
    decimal: String,
}

impl SpreadsheetParser for NumberParser {
    fn selector(&self) -> &ParserSelector {
        &self.selector
    }

    fn parse(&self, text: &str) -> Result<Value> {
        let mut normalized = text.trim().to_string();
        if !self.grouping.is_empty() {
            normalized = normalized.replace(&self.grouping, "");
        }
        if self.decimal != "." {
            normalized = normalized.replace(&self.decimal, ".");
        }
        normalized
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|e| ProviderError::Parse {
                parser: self.selector.to_string(),
                text: text.to_string(),
                message: e.to_string(),
            })
    }
}

#[derive(Debug)]
struct TextParser {
    selector: ParserSelector,
}

impl SpreadsheetParser for TextParser {
    fn selector(&self) -> &ParserSelector {
        &self.selector
    }

    fn parse(&self, text: &str) -> Result<Value> {
        Ok(Value::text(text))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinParserProvider;

impl BuiltinParserProvider {
    pub fn new() -> BuiltinParserProvider {
        BuiltinParserProvider
    }
}

fn text_values(name: &ParserName, values: &[Value]) -> Result<Vec<String>> {
    values
        .iter()
        .map(|value| {
            value
                .as_text()
                .map(str::to_string)
                .ok_or_else(|| ProviderError::InvalidValues {
                    name: name.to_string(),
                    message: format!("expected text, got {}", value.type_name()),
                })
        })
        .collect()
}

impl SpreadsheetParserProvider for BuiltinParserProvider {
    fn spreadsheet_parser(&self, selector: &ParserSelector) -> Result<Arc<dyn SpreadsheetParser>> {
        self.spreadsheet_parser_by_name(selector.name(), &selector.values()?)
    }

    fn spreadsheet_parser_by_name(
        &self,
        name: &ParserName,
        values: &[Value],
    ) -> Result<Arc<dyn SpreadsheetParser>> {
        let invalid = |message: &str| ProviderError::InvalidValues {
            name: name.to_string(),
            message: message.to_string(),
        };
        let selector = ParserSelector::with_values(name.clone(), values);

        let kind = match name.as_str() {
            DATE => PatternKind::Date,
            DATE_TIME => PatternKind::DateTime,
            TIME => PatternKind::Time,
            NUMBER => {
                let mut separators = text_values(name, values)?.into_iter();
                let grouping = separators.next().unwrap_or_else(|| ",".to_string());
                let decimal = separators.next().unwrap_or_else(|| ".".to_string());
                if separators.next().is_some() {
                    return Err(invalid("expected at most two separators"));
                }
                if decimal.is_empty() || decimal == grouping {
                    return Err(invalid("decimal separator must differ from grouping"));
                }
                return Ok(Arc::new(NumberParser {
                    selector,
                    grouping,
                    decimal,
                }));
            }
            TEXT => {
                if !values.is_empty() {
                    return Err(invalid("takes no values"));
                }
                return Ok(Arc::new(TextParser { selector }));
            }
            _ => return Err(ProviderError::UnknownParser(name.to_string())),
        };

        let patterns = text_values(name, values)?;
        if patterns.is_empty() {
            return Err(invalid("at least one pattern is required"));
        }
        Ok(Arc::new(PatternParser {
            selector,
            kind,
            patterns,
        }))
    }

    fn spreadsheet_parser_infos(&self) -> ParserInfoSet {
        NAMES
            .iter()
            .filter_map(|name| {
                let parser_name = ParserName::new(name).ok()?;
                ParserInfo::new(&format!("{}{}", PARSER_URL_BASE, name), parser_name).ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser(selector: &str) -> Arc<dyn SpreadsheetParser> {
        BuiltinParserProvider
            .spreadsheet_parser(&ParserSelector::parse(selector).unwrap())
            .unwrap()
    }

    #[test]
    fn test_infos_list_every_builtin() {
        let infos = BuiltinParserProvider.spreadsheet_parser_infos();
        assert_eq!(infos.len(), NAMES.len());
        let text = infos.get(&ParserName::new("text").unwrap()).unwrap();
        assert_eq!(text.url(), "https://cellscope.dev/parser/text");
    }

    #[test]
    fn test_date_patterns_tried_in_order() {
        let dates = parser("date-parse-pattern(\"%d/%m/%Y\", \"%Y-%m-%d\")");
        let expected = Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(dates.parse("29/02/2024").unwrap(), expected);
        assert_eq!(dates.parse("2024-02-29").unwrap(), expected);
        assert!(dates.parse("Feb 29").is_err());
    }

    #[test]
    fn test_raw_pattern_text() {
        let times = parser("time-parse-pattern %H:%M");
        assert_eq!(
            times.parse("13:45").unwrap(),
            Value::Time(NaiveTime::from_hms_opt(13, 45, 0).unwrap())
        );
        let stamps = parser("date-time-parse-pattern %Y-%m-%d %H:%M");
        assert!(stamps.parse("2024-01-02 03:04").is_ok());
    }

    #[test]
    fn test_number_separators() {
        assert_eq!(
            parser("number-parse-pattern").parse("1,234.5").unwrap(),
            Value::Number(1234.5)
        );
        assert_eq!(
            parser("number-parse-pattern(\".\", \",\")")
                .parse("1.234,5")
                .unwrap(),
            Value::Number(1234.5)
        );
        assert!(parser("number-parse-pattern").parse("abc").is_err());
    }

    #[test]
    fn test_invalid_values() {
        let provider = BuiltinParserProvider;
        let date = ParserName::new("date-parse-pattern").unwrap();
        assert!(provider.spreadsheet_parser_by_name(&date, &[]).is_err());
        assert!(
            provider
                .spreadsheet_parser_by_name(&date, &[Value::Number(1.0)])
                .is_err()
        );
        let text = ParserName::new("text").unwrap();
        assert!(
            provider
                .spreadsheet_parser_by_name(&text, &[Value::text("x")])
                .is_err()
        );
    }

    #[test]
    fn test_unknown_parser() {
        let err = BuiltinParserProvider
            .spreadsheet_parser(&ParserSelector::parse("nope").unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown parser nope");
    }
}
