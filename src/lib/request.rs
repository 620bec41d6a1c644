//! The values collected for one contract.
//!
//! A [`ContractRequest`] is built fresh for each generation, handed to the
//! pipeline by value and dropped afterwards. Nothing about a request outlives
//! the generation it was made for.

use crate::clauses::ClauseCatalog;
use crate::substitution::{normalize_percentage, SubstitutionRules};
use crate::ContractError;

pub const TOKEN_COMPANY_NAME: &str = "[CompanyName]";
pub const TOKEN_ADDRESS: &str = "[Address]";
pub const TOKEN_PERCENTAGE: &str = "[Percentage]";
pub const TOKEN_DATE: &str = "[Date]";
pub const TOKEN_SPECIAL_AGREEMENT: &str = "[SpecialAgreement]";

/// Default prefix of the generated file name.
pub const DEFAULT_FILENAME_PREFIX: &str = "Rahmenvereinbarung_";

/// Contract parameters. All values are free text and inserted unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractRequest {
    pub company_name: String,
    pub address: String,
    /// Always ends with `%`
    pub percentage: String,
    pub date: String,
    /// Clause labels in the order they were picked
    pub selected_clauses: Vec<String>,
}

impl ContractRequest {
    pub fn new(
        company_name: impl Into<String>,
        address: impl Into<String>,
        percentage: &str,
        date: impl Into<String>,
    ) -> Self {
        ContractRequest {
            company_name: company_name.into(),
            address: address.into(),
            percentage: normalize_percentage(percentage),
            date: date.into(),
            selected_clauses: Vec::new(),
        }
    }

    pub fn with_clauses<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_clauses = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the substitution rules for this request, in the order company
    /// name, address, percentage, date, special agreements.
    ///
    /// # Errors
    /// Fails with [`ContractError::UnknownClause`] when a selected clause is
    /// not in `catalog`.
    pub fn rules(&self, catalog: &ClauseCatalog) -> Result<SubstitutionRules, ContractError> {
        let special_agreement = catalog.render_list(&self.selected_clauses)?;
        let mut rules = SubstitutionRules::new();
        rules.insert(TOKEN_COMPANY_NAME, self.company_name.as_str());
        rules.insert(TOKEN_ADDRESS, self.address.as_str());
        rules.insert(TOKEN_PERCENTAGE, self.percentage.as_str());
        rules.insert(TOKEN_DATE, self.date.as_str());
        rules.insert(TOKEN_SPECIAL_AGREEMENT, special_agreement);
        Ok(rules)
    }

    /// File name offered for the finished document, e.g.
    /// `Rahmenvereinbarung_Acme GmbH.pdf`.
    ///
    /// Path separators in the company name become `_`, so the result is
    /// always a single file name.
    pub fn output_filename(&self, prefix: &str) -> String {
        let name: String = self
            .company_name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        format!("{}{}.pdf", prefix, name)
    }
}
