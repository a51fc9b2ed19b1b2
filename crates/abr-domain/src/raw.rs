//! The raw, not-yet-normalized shape the streaming parser builds one `<ABR>`
//! element at a time, before [`crate::adapter::normalize`] turns it into a
//! [`crate::Business`].
//!
//! Every date field here is the literal `YYYYMMDD` string lifted off the
//! XML element; normalization (including sentinel handling) happens only
//! in the adapter, never in the parser.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub record_last_updated: Option<String>,
    pub abn: Option<String>,
    pub abn_status: Option<String>,
    pub abn_status_from: Option<String>,
    pub entity_type_code: Option<String>,
    pub entity_type_text: Option<String>,
    pub main_entity_name: Option<String>,
    pub given_names: Vec<String>,
    pub family_name: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub gst_status: Option<String>,
    pub gst_from_date: Option<String>,
    pub acn: Option<String>,
    pub other_names: Vec<RawBusinessName>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBusinessName {
    pub name_type: String,
    pub name_text: String,
}
