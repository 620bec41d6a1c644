//! Catalog of the special agreements ("Sondervereinbarungen") that can be
//! attached to a contract.
//!
//! Each entry maps a short label, as offered in the selection, to its full
//! legal text. A request picks an ordered subset of labels; the catalog turns
//! that selection into a single HTML list with one item per clause, in the
//! order the labels were picked.

use crate::ContractError;

/// Label and text of the built-in clauses.
const DEFAULT_CLAUSES: &[(&str, &str)] = &[
    (
        "Nachbesetzung",
        "Falls der von Schwertfels Consulting vermittelte Kandidat während der Probezeit aus einem Grund kündigt, den nicht der Klient zu vertreten hat, oder seitens des Klienten eine Kündigung ausgesprochen wird, welche nicht der Klient zu vertreten hat, so bemüht sich Schwertfels Consulting um eine Nachbesetzung. In diesem Fall wird für die Nachbesetzung kein Honorar fällig. Für die Nachbesetzung gibt es keine zeitliche Begrenzung. Der Klient trägt die Darlegungs- und Beweislast, dass nicht er die Kündigung zu vertreten hat.",
    ),
    (
        "Rückerstattung bei Nichtantreten",
        "Bei Nichtantritt des Arbeitsverhältnisses wird dem Klienten 100% des bereits ausbezahlten Honorars rückerstattet.",
    ),
    (
        "Bei Rückzahlung",
        "Falls der von Schwertfels Consulting vermittelte Kandidat während der Probezeit aus einem Grund kündigt, den nicht der Klient zu vertreten hat, oder seitens des Klienten eine Kündigung ausgesprochen wird, welche nicht der Klient zu vertreten hat, so erhält der Klient eine Rückzahlung in Höhe von 50% des bereits ausbezahlten Honorars. Der Klient trägt die Darlegungs- und Beweislast, dass nicht er die Kündigung zu vertreten hat.",
    ),
    (
        "Für einzelne Berechnungen (25%)",
        "Für die erste erfolgreiche Vermittlung beträgt das Honorar 25% vom Jahreszielgehalt des Kandidaten.",
    ),
    (
        "Für einzelne Berechnungen (30%)",
        "Für die erste erfolgreiche Vermittlung beträgt das Honorar 30% vom Jahreszielgehalt des Kandidaten.",
    ),
    (
        "Drittel Regelung",
        "Drittel Regelung: 1. 1/3 bei Vertragsunterschrift\n2. 1/3 beim Antritt des Kandidaten.\n3. 1/3 bei Bestehen der Probezeit.",
    ),
    (
        "Auswahl bei Kündigung",
        "Falls der von Schwertfels Consulting vermittelte Kandidat während der Probezeit aus einem Grund kündigt, den nicht der Klient zu vertreten hat, oder seitens des Klienten eine Kündigung ausgesprochen wird, welche nicht der Klient zu vertreten hat, so erhält der Klient die Möglichkeit zwischen\na) einer kostenfreien Nachbesetzung\noder\nb) einer Rückzahlung in Höhe von 50% des bereits ausbezahlten Honorars.",
    ),
    (
        "Selten",
        "Wenn das Arbeitsverhältnis des Kandidaten vor Arbeitsbeginn oder während der Probezeit endet, hat Schwertfels Consulting die Pflicht, dem Auftraggeber eine Gutschrift auszustellen. Der Wert dieser Gutschrift ist abhängig von Anfang und Dauer des Arbeitsverhältnisses. Kündigung innerhalb der ersten 3 Monate der Probezeit: Der Auftraggeber erhält eine Gutschrift in Höhe von 50 % des Vermittlungshonorars. Kündigung innerhalb der letzten 3 Monate der Probezeit: Der Auftraggeber erhält eine Gutschrift in Höhe von 30 % des Vermittlungshonorars. Eine etwaige Gutschrift wird unabhängig von der Position erstattet. Diese Sondervereinbarung tritt nur in Kraft und das Honorar wird nur zurückerstattet, wenn Schwertfels Consulting die Position nicht innerhalb von 6 Monaten neu besetzt hat.",
    ),
];

/// An ordered, read-only label → text mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseCatalog {
    entries: Vec<(String, String)>,
}

impl Default for ClauseCatalog {
    fn default() -> Self {
        Self::from_entries(
            DEFAULT_CLAUSES
                .iter()
                .map(|(label, text)| (label.to_string(), text.to_string())),
        )
    }
}

impl ClauseCatalog {
    /// Builds a catalog from `(label, text)` pairs. A repeated label keeps its
    /// first position and takes the last text.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut catalog = ClauseCatalog {
            entries: Vec::new(),
        };
        for (label, text) in entries {
            match catalog.entries.iter_mut().find(|(l, _)| *l == label) {
                Some(entry) => entry.1 = text,
                None => catalog.entries.push((label, text)),
            }
        }
        catalog
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, text)| text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the selected clauses as `<ul><li>…</li>…</ul>`, one item per
    /// label in selection order. Clause text is inserted as-is.
    ///
    /// # Errors
    /// Returns [`ContractError::UnknownClause`] for a label that is not in the
    /// catalog.
    ///
    /// ```rust
    /// use contract2pdf::clauses::ClauseCatalog;
    ///
    /// let catalog = ClauseCatalog::from_entries(vec![
    ///     ("a".to_string(), "Alpha".to_string()),
    ///     ("b".to_string(), "Beta".to_string()),
    /// ]);
    /// let html = catalog.render_list(&["b", "a"]).unwrap();
    /// assert_eq!(html, "<ul><li>Beta</li><li>Alpha</li></ul>");
    /// ```
    pub fn render_list<S: AsRef<str>>(&self, selected: &[S]) -> Result<String, ContractError> {
        let mut html = String::from("<ul>");
        for label in selected {
            let label = label.as_ref();
            let text = self.get(label).ok_or_else(|| ContractError::UnknownClause {
                label: label.to_string(),
            })?;
            html.push_str("<li>");
            html.push_str(text);
            html.push_str("</li>");
        }
        html.push_str("</ul>");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> ClauseCatalog {
        ClauseCatalog::from_entries(vec![
            ("A".to_string(), "text a".to_string()),
            ("B".to_string(), "text b".to_string()),
            ("C".to_string(), "text c".to_string()),
        ])
    }

    #[test]
    fn test_default_catalog_has_builtin_clauses() {
        let catalog = ClauseCatalog::default();
        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.labels().next(), Some("Nachbesetzung"));
        assert!(catalog
            .get("Rückerstattung bei Nichtantreten")
            .unwrap()
            .contains("100%"));
    }

    #[test]
    fn test_render_list_keeps_selection_order() {
        let html = abc().render_list(&["A", "C", "B"]).unwrap();
        assert_eq!(
            html,
            "<ul><li>text a</li><li>text c</li><li>text b</li></ul>"
        );
    }

    #[test]
    fn test_render_empty_selection() {
        let empty: [&str; 0] = [];
        assert_eq!(abc().render_list(&empty).unwrap(), "<ul></ul>");
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let err = abc().render_list(&["A", "Z"]).unwrap_err();
        match err {
            ContractError::UnknownClause { label } => assert_eq!(label, "Z"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_entries_dedups_labels() {
        let catalog = ClauseCatalog::from_entries(vec![
            ("A".to_string(), "first".to_string()),
            ("B".to_string(), "b".to_string()),
            ("A".to_string(), "second".to_string()),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("A"), Some("second"));
        assert_eq!(catalog.labels().collect::<Vec<_>>(), vec!["A", "B"]);
    }
}
