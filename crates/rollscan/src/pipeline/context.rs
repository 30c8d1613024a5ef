//! Per-document accumulation of extracted payloads.
//!
//! Takes the fan-out result apart into header, footer, and stamped record
//! entries, then assembles the transactional insert for the store.

use std::collections::BTreeMap;

use crate::db::document_repo::{NewDocument, NewSection, NewSummaryRow, NewVoter};
use crate::extract::{FooterSummary, HeaderMetadata, PagePayload, RecordEntry};

use super::engine::{DocumentResult, PageFailure};
use super::error::PipelineError;

pub struct DocumentContext {
    pub file_name: String,
    pub header: Option<HeaderMetadata>,
    pub footer: Option<FooterSummary>,
    /// Record entries with page number and box position stamped.
    pub records: Vec<RecordEntry>,
    pub failures: Vec<PageFailure>,
    pub page_count: usize,
    pub pages_succeeded: usize,
    /// Records dropped for lacking a section name.
    pub records_skipped: usize,
}

impl DocumentContext {
    /// Dismantles an aggregated fan-out result. Pages arrive in index
    /// order, so record stamping is deterministic.
    pub fn from_result(file_name: &str, result: DocumentResult) -> Self {
        let mut ctx = Self {
            file_name: file_name.to_string(),
            header: None,
            footer: None,
            records: Vec::new(),
            failures: Vec::new(),
            page_count: result.page_count,
            pages_succeeded: result.pages_succeeded,
            records_skipped: 0,
        };

        for page in result.pages {
            match page.result {
                Ok(PagePayload::Header(header)) => ctx.header = Some(header),
                Ok(PagePayload::Footer(footer)) => ctx.footer = Some(footer),
                Ok(PagePayload::Records(entries)) => {
                    let page_no = page.index as i64 + 1;
                    for (position, mut entry) in entries.into_iter().enumerate() {
                        entry.page_no = Some(page_no);
                        entry.box_no_on_page = Some(position as i64 + 1);
                        ctx.records.push(entry);
                    }
                }
                Err(failure) => ctx.failures.push(failure),
            }
        }

        ctx
    }

    /// Number of records that will be inserted.
    pub fn usable_records(&self) -> usize {
        self.records
            .iter()
            .filter(|r| section_name_of(r).is_some())
            .count()
    }

    /// Assembles the transactional insert. Requires header metadata — a
    /// roll without its header page cannot be identified.
    pub fn into_new_document(mut self) -> Result<NewDocument, PipelineError> {
        let header = self.header.take().ok_or(PipelineError::MissingHeader)?;

        let mut sections: BTreeMap<String, Vec<NewVoter>> = BTreeMap::new();
        let mut skipped = 0usize;
        for record in &self.records {
            let Some(section_name) = section_name_of(record) else {
                log::warn!(
                    "page {:?}: dropping record {:?} without a section name",
                    record.page_no,
                    record.id_card_no
                );
                skipped += 1;
                continue;
            };
            sections
                .entry(section_name)
                .or_default()
                .push(to_new_voter(record));
        }
        if skipped > 0 {
            log::warn!(
                "{}: {} record(s) dropped for missing section names",
                self.file_name,
                skipped
            );
        }

        let summary_rows: Vec<NewSummaryRow> = self
            .footer
            .as_ref()
            .map(|footer| {
                footer
                    .rows
                    .iter()
                    .map(|row| NewSummaryRow {
                        description: row.description.clone(),
                        male_count: row.male_count,
                        female_count: row.female_count,
                        other_count: row.other_count,
                        total_count: row.total_count,
                    })
                    .collect()
            })
            .unwrap_or_default();

        // The grand total lives in the footer's last summary row.
        let total_records_count = self
            .footer
            .as_ref()
            .and_then(|footer| footer.rows.last())
            .and_then(|row| row.total_count);

        Ok(NewDocument {
            file_name: self.file_name,
            assembly_constituency: header.assembly_constituency,
            part_number: header.part_number,
            publication_date: header.publication_date,
            total_records_count,
            page_count: self.page_count as i64,
            pages_succeeded: self.pages_succeeded as i64,
            sections: sections
                .into_iter()
                .map(|(section_name, voters)| NewSection {
                    section_name,
                    voters,
                })
                .collect(),
            summary_rows,
        })
    }
}

fn section_name_of(record: &RecordEntry) -> Option<String> {
    let name = normalize_section_name(record.section_name.as_deref()?);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Trims and collapses internal whitespace so near-identical section names
/// from different pages land in one section row.
fn normalize_section_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn to_new_voter(record: &RecordEntry) -> NewVoter {
    NewVoter {
        id_card_no: record.id_card_no.clone().unwrap_or_default(),
        full_name: record.full_name.clone(),
        relative_name: record.relative_name.clone(),
        relation_type: record.relation_type.clone(),
        house_no: record.house_no.clone(),
        age: record.age,
        gender: record.gender.clone(),
        serial_no: record.serial_no,
        box_no_on_page: record.box_no_on_page,
        page_no: record.page_no,
        status_type: record
            .status_type
            .clone()
            .unwrap_or_else(|| "N".to_string()),
        raw_text: record.raw_text.clone(),
    }
}
