use std::collections::BTreeMap;

use crate::models::Field;

/// Canonical fields in priority order, each with the header spellings it
/// accepts (already trimmed and lowercased).
///
/// Matching is first-match-wins over this list: a header that appears under
/// several fields belongs to the one listed first. Reordering entries changes
/// which field such a header maps to.
pub const FIELD_VARIATIONS: &[(Field, &[&str])] = &[
    (
        Field::FirstName,
        &[
            "first_name", "firstname", "first name", "first", "fname", "f_name",
            "given name", "given_name", "givenname", "forename",
        ],
    ),
    (
        Field::LastName,
        &[
            "last_name", "lastname", "last name", "last", "lname", "l_name",
            "surname", "family name", "family_name",
        ],
    ),
    (
        Field::Team,
        &["team", "team name", "team_name", "group", "organization", "org"],
    ),
    (
        Field::Date,
        &[
            "date", "contact date", "contact_date", "day", "activity date",
            "activity_date", "date contacted",
        ],
    ),
    (
        Field::Tactic,
        &[
            "tactic", "tactics", "method", "contact method", "contact_method",
            "channel", "type", "contact type",
        ],
    ),
    (
        Field::Attempts,
        &[
            "attempts", "attempt", "total attempts", "total_attempts",
            "attempts made", "dials", "knocks",
        ],
    ),
    (
        Field::Contacts,
        &[
            "contacts", "contact", "total contacts", "total_contacts",
            "contacts made", "reached",
        ],
    ),
    (
        Field::NotHome,
        &["not_home", "nothome", "not home", "not-home", "nh", "no answer", "no_answer"],
    ),
    (
        Field::Refusal,
        &["refusal", "refusals", "refused", "refuse"],
    ),
    (
        Field::BadData,
        &[
            "bad_data", "baddata", "bad data", "bad-data", "bad info",
            "wrong number", "bad number", "bad address",
        ],
    ),
    (
        Field::Support,
        &["support", "supports", "supporter", "supporters", "yes", "strong support"],
    ),
    (
        Field::Oppose,
        &["oppose", "opposes", "opposed", "opposition", "no", "against"],
    ),
    (
        Field::Undecided,
        &["undecided", "undecideds", "unsure", "maybe", "neutral", "unknown"],
    ),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMapping {
    /// Column index to canonical field. A field is claimed by the first
    /// column that maps to it.
    pub columns: BTreeMap<usize, Field>,
    /// Headers that matched nothing, or matched a field already claimed.
    pub unmapped: Vec<String>,
}

impl HeaderMapping {
    pub fn contains(&self, field: Field) -> bool {
        self.columns.values().any(|mapped| *mapped == field)
    }
}

pub fn canonical_field(header: &str) -> Option<Field> {
    let normalized = header.trim().to_lowercase();
    FIELD_VARIATIONS
        .iter()
        .find(|(_, variations)| variations.contains(&normalized.as_str()))
        .map(|(field, _)| *field)
}

pub fn map_headers(headers: &[String]) -> HeaderMapping {
    let mut mapping = HeaderMapping::default();

    for (index, header) in headers.iter().enumerate() {
        match canonical_field(header) {
            Some(field) if !mapping.contains(field) => {
                mapping.columns.insert(index, field);
            }
            Some(field) => {
                tracing::debug!(header = %header, field = %field, "duplicate column ignored");
                mapping.unmapped.push(header.clone());
            }
            None => mapping.unmapped.push(header.clone()),
        }
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn header_variations_share_a_canonical_field() {
        for header in ["fname", "First Name", "given_name", "  FIRSTNAME "] {
            assert_eq!(canonical_field(header), Some(Field::FirstName), "{header}");
        }
        assert_eq!(canonical_field("Not Home"), Some(Field::NotHome));
        assert_eq!(canonical_field("Bad Data"), Some(Field::BadData));
    }

    #[test]
    fn list_columns_are_not_claimed() {
        let mapping = map_headers(&headers(&["First", "List", "Source"]));
        assert_eq!(mapping.columns.len(), 1);
        assert_eq!(mapping.unmapped, vec!["List".to_string(), "Source".to_string()]);
    }

    #[test]
    fn unknown_headers_are_dropped() {
        let mapping = map_headers(&headers(&["First", "Precinct", "Last"]));
        assert_eq!(mapping.columns.get(&0), Some(&Field::FirstName));
        assert_eq!(mapping.columns.get(&1), None);
        assert_eq!(mapping.columns.get(&2), Some(&Field::LastName));
        assert_eq!(mapping.unmapped, vec!["Precinct".to_string()]);
    }

    #[test]
    fn first_column_claims_a_field() {
        let mapping = map_headers(&headers(&["fname", "first_name", "tactic"]));
        assert_eq!(mapping.columns.len(), 2);
        assert_eq!(mapping.columns.get(&0), Some(&Field::FirstName));
        assert_eq!(mapping.unmapped, vec!["first_name".to_string()]);
    }

    #[test]
    fn every_variation_resolves_to_its_first_listed_field() {
        for (position, (field, variations)) in FIELD_VARIATIONS.iter().enumerate() {
            for variation in variations.iter() {
                let winner = canonical_field(variation).unwrap();
                let earlier = FIELD_VARIATIONS[..position]
                    .iter()
                    .any(|(_, vs)| vs.contains(variation));
                if !earlier {
                    assert_eq!(winner, *field, "{variation}");
                }
            }
        }
    }
}
