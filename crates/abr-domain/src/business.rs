//! The [`Business`] and [`BusinessName`] entities.
//!
//! `search_tokens` deliberately has no field here: it is a store-maintained,
//! derived column that application code must never assign or read directly
//! (see the schema layer in `abr-persistence`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::raw::RawBusinessName;

/// A [`Business`] plus its alternate names, normalized from a [`crate::RawRecord`]
/// but not yet assigned a surrogate id — the shape the adapter hands to the
/// Batch Writer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBusiness {
    pub abn: String,
    pub abn_status: String,
    pub abn_status_from: Option<NaiveDate>,
    pub entity_type_code: String,
    pub entity_type_text: Option<String>,
    pub entity_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub gst_status: Option<String>,
    pub gst_from_date: Option<NaiveDate>,
    pub acn: Option<String>,
    pub record_last_updated: Option<NaiveDate>,
    pub other_names: Vec<RawBusinessName>,
}

/// One business, keyed by its unique Australian Business Number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: i64,
    pub abn: String,
    pub abn_status: String,
    pub abn_status_from: Option<NaiveDate>,
    pub entity_type_code: String,
    pub entity_type_text: Option<String>,
    pub entity_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub gst_status: Option<String>,
    pub gst_from_date: Option<NaiveDate>,
    pub acn: Option<String>,
    pub record_last_updated: Option<NaiveDate>,

    /// Populated only by [`abr_persistence`]'s `find_by_abn`; `None` when a
    /// `Business` is returned from a search result, where the child rows
    /// are not fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_names: Option<Vec<BusinessName>>,
}

/// An alternate name recorded against a [`Business`] (trading name, legal
/// name, deductible-gift-recipient name, etc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessName {
    pub business_id: i64,
    pub name_type: String,
    pub name_text: String,
}

/// Equality comparator used by idempotence tests: two `Business` values are
/// "the same stored row" if every column but `id` and timestamps matches.
impl Business {
    pub fn same_content(&self, other: &Business) -> bool {
        self.abn == other.abn
            && self.abn_status == other.abn_status
            && self.abn_status_from == other.abn_status_from
            && self.entity_type_code == other.entity_type_code
            && self.entity_type_text == other.entity_type_text
            && self.entity_name == other.entity_name
            && self.given_name == other.given_name
            && self.family_name == other.family_name
            && self.state == other.state
            && self.postcode == other.postcode
            && self.gst_status == other.gst_status
            && self.gst_from_date == other.gst_from_date
            && self.acn == other.acn
            && self.record_last_updated == other.record_last_updated
    }
}
