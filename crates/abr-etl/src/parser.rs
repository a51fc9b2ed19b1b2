//! Streaming Parser & Adapter (C4): a pull-event reader over `quick-xml`
//! that builds one [`RawRecord`] per `<ABR>` element and hands each
//! completed, normalized record to the [`BatchWriter`] before reading
//! further bytes. Memory usage is bounded by the largest single record,
//! not by document size.

use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use abr_domain::{normalize, RawBusinessName, RawRecord};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::writer::BatchWriter;

/// Emitted every 10,000 records processed, per §4.4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProgress {
    pub processed: u64,
}

/// Terminal result of a full parse run (§4.4.4, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOutcome {
    pub total_processed: u64,
    pub total_inserted: u64,
    pub total_updated: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read source file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Storage(#[from] abr_persistence::StorageError),
}

const PROGRESS_INTERVAL: u64 = 10_000;

/// Parses `path` and drives `writer` to completion, reporting progress via
/// `on_progress` every [`PROGRESS_INTERVAL`] records.
pub async fn parse_file(
    path: impl AsRef<Path>,
    mut writer: BatchWriter,
    mut on_progress: impl FnMut(ParseProgress),
) -> Result<ParseOutcome, ParseError> {
    let started = Instant::now();
    let file = std::fs::File::open(path)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let mut xml_buf = Vec::new();
    let mut state = ParserState::default();
    let mut processed: u64 = 0;

    loop {
        let event = reader.read_event_into(&mut xml_buf)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                let name = decode_name(e);
                state.current_text.clear();
                on_open(&name, e, &mut state);
                state.element_stack.push(name);
            }
            Event::Empty(ref e) => {
                let name = decode_name(e);
                state.current_text.clear();
                on_open(&name, e, &mut state);
                state.element_stack.push(name.clone());
                if let Some(record) = on_close(&name, &mut state) {
                    processed += 1;
                    submit(record, &mut writer).await?;
                    maybe_report_progress(processed, &mut on_progress);
                }
                state.element_stack.pop();
            }
            Event::Text(ref e) => {
                state.current_text.push_str(&e.unescape()?);
            }
            Event::CData(ref e) => {
                state.current_text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(record) = on_close(&name, &mut state) {
                    processed += 1;
                    submit(record, &mut writer).await?;
                    maybe_report_progress(processed, &mut on_progress);
                }
                state.element_stack.pop();
            }
            _ => {}
        }
        xml_buf.clear();
    }

    // §4.4.4: final flush, then destroy, then report totals.
    let totals = writer.destroy().await?;

    Ok(ParseOutcome {
        total_processed: processed,
        total_inserted: totals.total_inserted,
        total_updated: totals.total_updated,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

async fn submit(raw: RawRecord, writer: &mut BatchWriter) -> Result<(), ParseError> {
    if raw.abn.as_deref().map(str::is_empty).unwrap_or(true) {
        return Ok(());
    }
    let business = normalize(raw);
    writer.add(business).await?;
    Ok(())
}

fn maybe_report_progress(processed: u64, on_progress: &mut impl FnMut(ParseProgress)) {
    if processed % PROGRESS_INTERVAL == 0 {
        on_progress(ParseProgress { processed });
    }
}

#[derive(Default)]
struct ParserState {
    element_stack: Vec<String>,
    current_text: String,
    current_record: Option<RawRecord>,
    current_other_name_type: Option<String>,
}

fn decode_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
        .filter(|s| !s.is_empty())
}

fn nth_from_end(stack: &[String], n: usize) -> Option<&str> {
    stack.len().checked_sub(n + 1).and_then(|i| stack.get(i)).map(String::as_str)
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// §4.4.2 open-tag handling: allocate the record on `<ABR>`, snapshot
/// status attributes on `<ABN>`/`<GST>`, and snapshot the alternate-name
/// type on a `<NonIndividualName>` whose parent (the stack top *before*
/// this element is pushed) is `OtherEntity` or `DGR`.
fn on_open(name: &str, e: &BytesStart, state: &mut ParserState) {
    match name {
        "ABR" => {
            let mut record = RawRecord::default();
            record.record_last_updated = attr_value(e, b"recordLastUpdatedDate");
            state.current_record = Some(record);
        }
        "ABN" => {
            if let Some(record) = state.current_record.as_mut() {
                record.abn_status = attr_value(e, b"status");
                record.abn_status_from = attr_value(e, b"ABNStatusFromDate");
            }
        }
        "GST" => {
            if let Some(record) = state.current_record.as_mut() {
                record.gst_status = attr_value(e, b"status");
                record.gst_from_date = attr_value(e, b"GSTStatusFromDate");
            }
        }
        "NonIndividualName" => {
            let parent = state.element_stack.last().map(String::as_str);
            if matches!(parent, Some("OtherEntity") | Some("DGR")) {
                state.current_other_name_type = attr_value(e, b"type");
            }
        }
        _ => {}
    }
}

/// §4.4.2 close-tag handling. Returns the completed, raw `ABR` record (if
/// this close was an `</ABR>` with a non-empty `abn`) for the caller to
/// normalize and submit; `None` for every other closing tag, and for a
/// discarded malformed `ABR` with no `abn`.
fn on_close(name: &str, state: &mut ParserState) -> Option<RawRecord> {
    let text = state.current_text.trim().to_string();

    match name {
        "ABR" => return state.current_record.take().filter(|r| r.abn.as_deref().is_some_and(|a| !a.is_empty())),
        "ABN" => {
            if let Some(record) = state.current_record.as_mut() {
                record.abn = non_empty(&text);
            }
        }
        "EntityTypeInd" => {
            if let Some(record) = state.current_record.as_mut() {
                record.entity_type_code = non_empty(&text);
            }
        }
        "EntityTypeText" => {
            if let Some(record) = state.current_record.as_mut() {
                record.entity_type_text = non_empty(&text);
            }
        }
        "NonIndividualNameText" => {
            let grandparent = nth_from_end(&state.element_stack, 2);
            if let Some(record) = state.current_record.as_mut() {
                match grandparent {
                    Some("MainEntity") => record.main_entity_name = non_empty(&text),
                    Some("OtherEntity") | Some("DGR") => {
                        if let (Some(name_type), false) = (state.current_other_name_type.take(), text.is_empty()) {
                            record.other_names.push(RawBusinessName {
                                name_type,
                                name_text: text.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        "GivenName" => {
            if let Some(record) = state.current_record.as_mut() {
                if !text.is_empty() {
                    record.given_names.push(text.clone());
                }
            }
        }
        "FamilyName" => {
            if let Some(record) = state.current_record.as_mut() {
                record.family_name = non_empty(&text);
            }
        }
        "State" => {
            if let Some(record) = state.current_record.as_mut() {
                record.state = non_empty(&text);
            }
        }
        "Postcode" => {
            if let Some(record) = state.current_record.as_mut() {
                record.postcode = non_empty(&text);
            }
        }
        "ASICNumber" => {
            if let Some(record) = state.current_record.as_mut() {
                record.acn = non_empty(&text);
            }
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(xml: &str) -> Option<RawRecord> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut state = ParserState::default();
        let mut result = None;

        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Eof => break,
                Event::Start(ref e) => {
                    let name = decode_name(e);
                    state.current_text.clear();
                    on_open(&name, e, &mut state);
                    state.element_stack.push(name);
                }
                Event::Empty(ref e) => {
                    let name = decode_name(e);
                    state.current_text.clear();
                    on_open(&name, e, &mut state);
                    state.element_stack.push(name.clone());
                    if let Some(record) = on_close(&name, &mut state) {
                        result = Some(record);
                    }
                    state.element_stack.pop();
                }
                Event::Text(ref e) => {
                    state.current_text.push_str(&e.unescape().unwrap());
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if let Some(record) = on_close(&name, &mut state) {
                        result = Some(record);
                    }
                    state.element_stack.pop();
                }
                _ => {}
            }
            buf.clear();
        }

        result
    }

    #[test]
    fn extracts_primary_and_alternate_names_with_grandparent_disambiguation() {
        let xml = r#"
            <ABR recordLastUpdatedDate="20240101">
                <ABN status="ACT" ABNStatusFromDate="20010101">51824753556</ABN>
                <EntityTypeInd>PRV</EntityTypeInd>
                <MainEntity>
                    <NonIndividualName>
                        <NonIndividualNameText>VANTAGE SEARCH PTY LTD</NonIndividualNameText>
                    </NonIndividualName>
                </MainEntity>
                <OtherEntity>
                    <NonIndividualName type="TRD">
                        <NonIndividualNameText>VANTAGE SEARCH</NonIndividualNameText>
                    </NonIndividualName>
                </OtherEntity>
                <State>NSW</State>
                <Postcode>2000</Postcode>
            </ABR>
        "#;

        let record = drive(xml).expect("record should be produced");
        assert_eq!(record.abn.as_deref(), Some("51824753556"));
        assert_eq!(record.main_entity_name.as_deref(), Some("VANTAGE SEARCH PTY LTD"));
        assert_eq!(record.other_names.len(), 1);
        assert_eq!(record.other_names[0].name_type, "TRD");
        assert_eq!(record.other_names[0].name_text, "VANTAGE SEARCH");
        assert_eq!(record.state.as_deref(), Some("NSW"));
    }

    #[test]
    fn discards_record_with_no_abn() {
        let xml = r#"<ABR recordLastUpdatedDate="20240101"><State>NSW</State></ABR>"#;
        assert!(drive(xml).is_none());
    }

    #[test]
    fn collects_multiple_given_names_for_individuals() {
        let xml = r#"
            <ABR recordLastUpdatedDate="20240101">
                <ABN status="ACT" ABNStatusFromDate="20010101">12345678901</ABN>
                <EntityTypeInd>IND</EntityTypeInd>
                <LegalEntity>
                    <GivenName>MARY</GivenName>
                    <GivenName>JANE</GivenName>
                    <FamilyName>DOE</FamilyName>
                </LegalEntity>
            </ABR>
        "#;
        let record = drive(xml).expect("record should be produced");
        assert_eq!(record.given_names, vec!["MARY".to_string(), "JANE".to_string()]);
        assert_eq!(record.family_name.as_deref(), Some("DOE"));
    }
}
