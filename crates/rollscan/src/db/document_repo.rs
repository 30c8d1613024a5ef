//! Document repository — transactional write path and cascade delete for
//! extracted roll documents.
//!
//! `insert_document` commits a document and every dependent row in a single
//! transaction: a failure anywhere (including constraint violations on voter
//! rows) leaves the store exactly as it was. `delete_document` relies on the
//! `ON DELETE CASCADE` declarations, so dependent rows never outlive their
//! document.

use rusqlite::types::ValueRef;
use rusqlite::{params, Row, Transaction};

use super::{Database, DatabaseError};

/// A fully extracted document ready for insertion.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub file_name: String,
    pub assembly_constituency: Option<String>,
    pub part_number: Option<i64>,
    pub publication_date: Option<String>,
    pub total_records_count: Option<i64>,
    pub page_count: i64,
    pub pages_succeeded: i64,
    pub sections: Vec<NewSection>,
    pub summary_rows: Vec<NewSummaryRow>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSection {
    pub section_name: String,
    pub voters: Vec<NewVoter>,
}

#[derive(Debug, Clone, Default)]
pub struct NewVoter {
    pub id_card_no: String,
    pub full_name: Option<String>,
    pub relative_name: Option<String>,
    pub relation_type: Option<String>,
    pub house_no: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub serial_no: Option<i64>,
    pub box_no_on_page: Option<i64>,
    pub page_no: Option<i64>,
    pub status_type: String,
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSummaryRow {
    pub description: Option<String>,
    pub male_count: Option<i64>,
    pub female_count: Option<i64>,
    pub other_count: Option<i64>,
    pub total_count: Option<i64>,
}

/// A stored document row.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub file_name: String,
    pub assembly_constituency: Option<String>,
    pub part_number: Option<i64>,
    pub publication_date: Option<String>,
    pub total_records_count: Option<i64>,
    pub page_count: i64,
    pub pages_succeeded: i64,
    pub processed_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_name: row.get("file_name")?,
            assembly_constituency: row.get("assembly_constituency")?,
            part_number: row.get("part_number")?,
            publication_date: row.get("publication_date")?,
            total_records_count: row.get("total_records_count")?,
            page_count: row.get("page_count")?,
            pages_succeeded: row.get("pages_succeeded")?,
            processed_at: row.get("processed_at")?,
        })
    }
}

/// A full table dump for the export collaborator.
#[derive(Debug, Clone)]
pub struct TableDump {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Tables exposed to the export collaborator, parent first.
const EXPORT_TABLES: &[&str] = &["documents", "sections", "voters", "summary_stats"];

/// Inserts a document together with all of its sections, voters, and
/// summary rows in one transaction. Returns the new document id.
///
/// A duplicate `file_name` is reported as `DatabaseError::DocumentExists`
/// before any row is written; any other failure rolls the transaction back.
pub fn insert_document(db: &Database, doc: &NewDocument) -> Result<i64, DatabaseError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        let exists = match tx.query_row(
            "SELECT 1 FROM documents WHERE file_name = ?1",
            params![doc.file_name],
            |_| Ok(()),
        ) {
            Ok(()) => true,
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(e) => return Err(DatabaseError::Sqlite(e)),
        };
        if exists {
            return Err(DatabaseError::DocumentExists(doc.file_name.clone()));
        }

        tx.execute(
            "INSERT INTO documents (file_name, assembly_constituency, part_number,
             publication_date, total_records_count, page_count, pages_succeeded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                doc.file_name,
                doc.assembly_constituency,
                doc.part_number,
                doc.publication_date,
                doc.total_records_count,
                doc.page_count,
                doc.pages_succeeded,
            ],
        )?;
        let document_id = tx.last_insert_rowid();

        for row in &doc.summary_rows {
            tx.execute(
                "INSERT INTO summary_stats (document_id, description, male_count,
                 female_count, other_count, total_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    document_id,
                    row.description,
                    row.male_count,
                    row.female_count,
                    row.other_count,
                    row.total_count,
                ],
            )?;
        }

        let mut inserted = 0usize;
        for section in &doc.sections {
            let section_id = insert_section(&tx, document_id, &section.section_name)?;
            for voter in &section.voters {
                tx.execute(
                    "INSERT INTO voters (section_id, id_card_no, full_name, relative_name,
                     relation_type, house_no, age, gender, serial_no, box_no_on_page,
                     page_no, status_type, raw_text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    params![
                        section_id,
                        voter.id_card_no,
                        voter.full_name,
                        voter.relative_name,
                        voter.relation_type,
                        voter.house_no,
                        voter.age,
                        voter.gender,
                        voter.serial_no,
                        voter.box_no_on_page,
                        voter.page_no,
                        voter.status_type,
                        voter.raw_text,
                    ],
                )?;
                inserted += 1;
            }
        }

        tx.commit()?;
        log::info!(
            "Committed document '{}' (id {}) with {} voter record(s)",
            doc.file_name,
            document_id,
            inserted
        );
        Ok(document_id)
    })
}

fn insert_section(
    tx: &Transaction<'_>,
    document_id: i64,
    section_name: &str,
) -> Result<i64, DatabaseError> {
    tx.execute(
        "INSERT INTO sections (document_id, section_name) VALUES (?1, ?2)",
        params![document_id, section_name],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Deletes a document by file name. Dependent section, voter, and summary
/// rows are removed by the cascade declarations.
///
/// Returns `false` when no such document exists; the store is untouched and
/// calling again is safe.
pub fn delete_document(db: &Database, file_name: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM documents WHERE file_name = ?1",
            params![file_name],
        )?;
        if deleted == 0 {
            log::warn!("delete_document: no document named '{}'", file_name);
        }
        Ok(deleted > 0)
    })
}

/// Lists all stored documents, newest first.
pub fn list_documents(db: &Database) -> Result<Vec<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM documents ORDER BY processed_at DESC, id DESC")?;
        let rows: Vec<DocumentRow> = stmt
            .query_map([], DocumentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds a document by its file name.
pub fn find_by_file_name(
    db: &Database,
    file_name: &str,
) -> Result<Option<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM documents WHERE file_name = ?1")?;
        let mut rows = stmt.query_map(params![file_name], DocumentRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Dumps every export table as (name, columns, rows). Only committed rows
/// are visible — the write path is a single transaction.
pub fn dump_all_tables(db: &Database) -> Result<Vec<TableDump>, DatabaseError> {
    db.with_conn(|conn| {
        let mut dumps = Vec::with_capacity(EXPORT_TABLES.len());
        for table in EXPORT_TABLES {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {}", table))?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(|c| c.to_string())
                .collect();
            let column_count = columns.len();
            let rows: Vec<Vec<String>> = stmt
                .query_map([], |row| {
                    let mut values = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        values.push(format_value(row.get_ref(i)?));
                    }
                    Ok(values)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            dumps.push(TableDump {
                name: table.to_string(),
                columns,
                rows,
            });
        }
        Ok(dumps)
    })
}

fn format_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
