//! Text parsers and the providers that hand them out.
//!
//! A parser is requested either with a selector (`date-parse-pattern %Y-%m-%d`,
//! `number-parse-pattern(",", ".")`) or with a name plus values. Providers can
//! be stacked:
//!
//! - [`BuiltinParserProvider`] - Date, date-time, time, number and text parsers
//! - [`AliasesParserProvider`] - Exposes a provider under declared names and aliases
//! - [`MergedMappedParserProvider`] - Renames a provider's parsers by URL
//! - [`ParserProviderCollection`] - Union of several providers

mod aliases;
mod builtin;
mod collection;
mod error;
mod info;
mod merged;
mod selector;

use std::sync::Arc;

use crate::engine::Value;

pub use aliases::{AliasesParserProvider, ParserAlias, ParserAliasSet};
pub use builtin::{BuiltinParserProvider, PARSER_URL_BASE};
pub use collection::ParserProviderCollection;
pub use error::{ProviderError, Result};
pub use info::{ParserInfo, ParserInfoSet};
pub use merged::MergedMappedParserProvider;
pub use selector::{ParserName, ParserSelector, format_values, parse_values};

/// Turns text into a value.
pub trait SpreadsheetParser: Send + Sync + std::fmt::Debug {
    /// The selector this parser was created from.
    fn selector(&self) -> &ParserSelector;

    fn parse(&self, text: &str) -> Result<Value>;
}

/// Hands out parsers by selector or by name and values.
pub trait SpreadsheetParserProvider: Send + Sync {
    fn spreadsheet_parser(&self, selector: &ParserSelector) -> Result<Arc<dyn SpreadsheetParser>>;

    fn spreadsheet_parser_by_name(
        &self,
        name: &ParserName,
        values: &[Value],
    ) -> Result<Arc<dyn SpreadsheetParser>>;

    /// Every parser this provider offers.
    fn spreadsheet_parser_infos(&self) -> ParserInfoSet;
}

impl<T: SpreadsheetParserProvider + ?Sized> SpreadsheetParserProvider for Arc<T> {
    fn spreadsheet_parser(&self, selector: &ParserSelector) -> Result<Arc<dyn SpreadsheetParser>> {
        (**self).spreadsheet_parser(selector)
    }

    fn spreadsheet_parser_by_name(
        &self,
        name: &ParserName,
        values: &[Value],
    ) -> Result<Arc<dyn SpreadsheetParser>> {
        (**self).spreadsheet_parser_by_name(name, values)
    }

    fn spreadsheet_parser_infos(&self) -> ParserInfoSet {
        (**self).spreadsheet_parser_infos()
    }
}
