//! Renaming a provider's parsers by URL.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::{ProviderError, Result};
use super::info::ParserInfoSet;
use super::selector::{ParserName, ParserSelector};
use super::{SpreadsheetParser, SpreadsheetParserProvider};
use crate::engine::Value;

/// Offers the wrapped provider's parsers under the names given by `infos`,
/// matched on URL. Parsers whose URL is not mapped keep their own name.
pub struct MergedMappedParserProvider {
    /// Exposed name to the wrapped provider's name.
    names: HashMap<ParserName, ParserName>,
    provider: Arc<dyn SpreadsheetParserProvider>,
    infos: ParserInfoSet,
}

impl MergedMappedParserProvider {
    pub fn new(mapped: ParserInfoSet, provider: Arc<dyn SpreadsheetParserProvider>) -> Self {
        let mut names = HashMap::new();
        let mut infos = ParserInfoSet::new();

        for info in provider.spreadsheet_parser_infos().iter() {
            let exposed = match mapped.by_url(info.url()) {
                Some(mapped) => mapped.clone(),
                None => info.clone(),
            };
            names.insert(exposed.name().clone(), info.name().clone());
            infos.insert(exposed);
        }

        MergedMappedParserProvider {
            names,
            provider,
            infos,
        }
    }

    fn wrapped_name(&self, name: &ParserName) -> Result<&ParserName> {
        self.names
            .get(name)
            .ok_or_else(|| ProviderError::UnknownParser(name.to_string()))
    }
}

impl SpreadsheetParserProvider for MergedMappedParserProvider {
    fn spreadsheet_parser(&self, selector: &ParserSelector) -> Result<Arc<dyn SpreadsheetParser>> {
        let name = self.wrapped_name(selector.name())?;
        self.provider.spreadsheet_parser(&selector.renamed(name.clone()))
    }

    fn spreadsheet_parser_by_name(
        &self,
        name: &ParserName,
        values: &[Value],
    ) -> Result<Arc<dyn SpreadsheetParser>> {
        let name = self.wrapped_name(name)?;
        self.provider.spreadsheet_parser_by_name(name, values)
    }

    fn spreadsheet_parser_infos(&self) -> ParserInfoSet {
        self.infos.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{BuiltinParserProvider, PARSER_URL_BASE, ParserInfo};

    fn name(text: &str) -> ParserName {
        ParserName::new(text).unwrap()
    }

    fn provider() -> MergedMappedParserProvider {
        let mapped: ParserInfoSet = [ParserInfo::new(
            &format!("{}date-parse-pattern", PARSER_URL_BASE),
            name("date"),
        )
        .unwrap()]
        .into_iter()
        .collect();
        MergedMappedParserProvider::new(mapped, Arc::new(BuiltinParserProvider))
    }

    #[test]
    fn test_mapped_name_reaches_wrapped_parser() {
        let parser = provider()
            .spreadsheet_parser(&ParserSelector::parse("date %Y").unwrap())
            .unwrap();
        assert_eq!(parser.selector().name(), &name("date-parse-pattern"));
        assert!(parser.parse("2024").is_err());
    }

    #[test]
    fn test_unmapped_names_pass_through() {
        let provider = provider();
        assert!(
            provider
                .spreadsheet_parser_by_name(&name("text"), &[])
                .is_ok()
        );
        assert!(
            provider
                .spreadsheet_parser_by_name(&name("date-parse-pattern"), &[Value::text("%Y")])
                .is_err()
        );
    }

    #[test]
    fn test_infos_use_mapped_names() {
        let infos = provider().spreadsheet_parser_infos();
        assert!(infos.contains(&name("date")));
        assert!(!infos.contains(&name("date-parse-pattern")));
        assert!(infos.contains(&name("number-parse-pattern")));
    }
}
