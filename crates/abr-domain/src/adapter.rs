//! Normalizes a [`RawRecord`] lifted off the wire into a [`NormalizedBusiness`].
//!
//! This is pure, synchronous, and side-effect free so it can be unit tested
//! without a parser or a store in the loop.

use crate::business::NormalizedBusiness;
use crate::dates::parse_abr_date;
use crate::raw::RawRecord;

const INDIVIDUAL_ENTITY_TYPE: &str = "IND";
const UNKNOWN_ENTITY_NAME: &str = "Unknown Entity";

/// Turns a raw, just-closed `<ABR>` record into a [`NormalizedBusiness`].
///
/// Callers are responsible for discarding records with no `abn` before
/// calling this — `normalize` assumes `raw.abn` is `Some`, and substitutes
/// an empty string if it isn't (the parser never exercises that path).
pub fn normalize(raw: RawRecord) -> NormalizedBusiness {
    let entity_type_code = raw.entity_type_code.clone().unwrap_or_default();

    let (given_name, family_name, entity_name) = if entity_type_code == INDIVIDUAL_ENTITY_TYPE {
        let given_name = join_non_empty(&raw.given_names, " ");
        let family_name = non_empty(raw.family_name.clone());
        let entity_name = join_non_empty(
            &[given_name.clone(), family_name.clone()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>(),
            " ",
        )
        .unwrap_or_default();
        (given_name, family_name, entity_name)
    } else {
        let entity_name = non_empty(raw.main_entity_name.clone())
            .unwrap_or_else(|| UNKNOWN_ENTITY_NAME.to_string());
        (None, None, entity_name)
    };

    NormalizedBusiness {
        abn: raw.abn.unwrap_or_default(),
        abn_status: raw.abn_status.unwrap_or_default(),
        abn_status_from: raw.abn_status_from.as_deref().and_then(parse_abr_date),
        entity_type_code,
        entity_type_text: non_empty(raw.entity_type_text),
        entity_name,
        given_name,
        family_name,
        state: non_empty(raw.state),
        postcode: non_empty(raw.postcode),
        gst_status: non_empty(raw.gst_status),
        gst_from_date: raw.gst_from_date.as_deref().and_then(parse_abr_date),
        acn: non_empty(raw.acn),
        record_last_updated: raw.record_last_updated.as_deref().and_then(parse_abr_date),
        other_names: raw.other_names,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn join_non_empty(parts: &[String], sep: &str) -> Option<String> {
    let joined = parts
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep);
    if joined.is_empty() { None } else { Some(joined) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawBusinessName;

    /// S1 — Individual normalization.
    #[test]
    fn individual_normalization() {
        let raw = RawRecord {
            abn: Some("51824753556".to_string()),
            abn_status: Some("ACT".to_string()),
            abn_status_from: Some("19000101".to_string()),
            entity_type_code: Some("IND".to_string()),
            entity_type_text: Some("Individual/Sole Trader".to_string()),
            given_names: vec!["MARY".to_string(), "JANE".to_string()],
            family_name: Some("DOE".to_string()),
            gst_from_date: Some("19000101".to_string()),
            record_last_updated: Some("19000101".to_string()),
            ..Default::default()
        };

        let business = normalize(raw);

        assert_eq!(business.entity_name, "MARY JANE DOE");
        assert_eq!(business.given_name.as_deref(), Some("MARY JANE"));
        assert_eq!(business.family_name.as_deref(), Some("DOE"));
        assert_eq!(business.abn_status_from, None);
        assert_eq!(business.gst_from_date, None);
        assert_eq!(business.record_last_updated, None);
    }

    /// S2 — Non-individual normalization.
    #[test]
    fn non_individual_normalization() {
        let raw = RawRecord {
            abn: Some("53004085616".to_string()),
            abn_status: Some("ACT".to_string()),
            entity_type_code: Some("PRV".to_string()),
            main_entity_name: Some("VANTAGE SEARCH PTY LTD".to_string()),
            other_names: vec![
                RawBusinessName {
                    name_type: "TRD".to_string(),
                    name_text: "VANTAGE DIRECTORY".to_string(),
                },
                RawBusinessName {
                    name_type: "BN".to_string(),
                    name_text: "VANTAGE SEARCH".to_string(),
                },
            ],
            ..Default::default()
        };

        let business = normalize(raw);

        assert_eq!(business.entity_name, "VANTAGE SEARCH PTY LTD");
        assert_eq!(business.given_name, None);
        assert_eq!(business.family_name, None);
        assert_eq!(business.other_names.len(), 2);
    }

    #[test]
    fn non_individual_falls_back_to_unknown_entity() {
        let raw = RawRecord {
            abn: Some("00000000001".to_string()),
            entity_type_code: Some("PRV".to_string()),
            ..Default::default()
        };

        let business = normalize(raw);
        assert_eq!(business.entity_name, "Unknown Entity");
    }

    #[test]
    fn individual_with_no_given_names_omits_them() {
        let raw = RawRecord {
            abn: Some("00000000002".to_string()),
            entity_type_code: Some("IND".to_string()),
            family_name: Some("SOLO".to_string()),
            ..Default::default()
        };

        let business = normalize(raw);
        assert_eq!(business.given_name, None);
        assert_eq!(business.entity_name, "SOLO");
    }
}
