//! Read-only aggregate queries for the dashboard collaborator.
//!
//! Only committed rows are visible; nothing here writes.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// One label/count pair, e.g. ("female", 451) or ("30-39", 127).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub label: String,
    pub count: i64,
}

impl CategoryCount {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            label: row.get(0)?,
            count: row.get(1)?,
        })
    }
}

/// A section row, for dashboard section pickers.
#[derive(Debug, Clone)]
pub struct SectionRow {
    pub id: i64,
    pub document_id: i64,
    pub section_name: String,
}

const AGE_BUCKET_EXPR: &str = "CASE
        WHEN age BETWEEN 18 AND 29 THEN '18-29'
        WHEN age BETWEEN 30 AND 39 THEN '30-39'
        WHEN age BETWEEN 40 AND 49 THEN '40-49'
        WHEN age BETWEEN 50 AND 59 THEN '50-59'
        ELSE '60+'
    END";

/// Lists the sections of a document, alphabetically.
pub fn list_sections_for_document(
    db: &Database,
    document_id: i64,
) -> Result<Vec<SectionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, document_id, section_name FROM sections
             WHERE document_id = ?1 ORDER BY section_name",
        )?;
        let rows = stmt
            .query_map(params![document_id], |row| {
                Ok(SectionRow {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    section_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Voter counts by gender for one section.
pub fn gender_counts_for_section(
    db: &Database,
    section_id: i64,
) -> Result<Vec<CategoryCount>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT gender, COUNT(*) FROM voters
             WHERE section_id = ?1 AND gender IS NOT NULL
             GROUP BY gender ORDER BY gender",
        )?;
        let rows = stmt
            .query_map(params![section_id], CategoryCount::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Voter counts by gender across a whole document.
pub fn gender_counts_for_document(
    db: &Database,
    document_id: i64,
) -> Result<Vec<CategoryCount>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT v.gender, COUNT(*)
             FROM voters v JOIN sections s ON v.section_id = s.id
             WHERE s.document_id = ?1 AND v.gender IS NOT NULL
             GROUP BY v.gender ORDER BY v.gender",
        )?;
        let rows = stmt
            .query_map(params![document_id], CategoryCount::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Age-bucket distribution for one section.
pub fn age_distribution_for_section(
    db: &Database,
    section_id: i64,
) -> Result<Vec<CategoryCount>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {bucket} AS age_group, COUNT(*) FROM voters
             WHERE section_id = ?1 AND age IS NOT NULL
             GROUP BY age_group ORDER BY age_group",
            bucket = AGE_BUCKET_EXPR
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![section_id], CategoryCount::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Age-bucket distribution across a whole document.
pub fn age_distribution_for_document(
    db: &Database,
    document_id: i64,
) -> Result<Vec<CategoryCount>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {bucket} AS age_group, COUNT(*)
             FROM voters v JOIN sections s ON v.section_id = s.id
             WHERE s.document_id = ?1 AND v.age IS NOT NULL
             GROUP BY age_group ORDER BY age_group",
            bucket = AGE_BUCKET_EXPR
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![document_id], CategoryCount::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::document_repo::{
        insert_document, NewDocument, NewSection, NewVoter,
    };

    fn voter(id_card: &str, gender: &str, age: i64) -> NewVoter {
        NewVoter {
            id_card_no: id_card.to_string(),
            gender: Some(gender.to_string()),
            age: Some(age),
            status_type: "N".to_string(),
            ..Default::default()
        }
    }

    fn seed() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let doc = NewDocument {
            file_name: "analytics.pdf".to_string(),
            page_count: 4,
            pages_succeeded: 4,
            sections: vec![
                NewSection {
                    section_name: "Ward 1".to_string(),
                    voters: vec![
                        voter("A000000001", "male", 25),
                        voter("A000000002", "female", 34),
                        voter("A000000003", "female", 36),
                    ],
                },
                NewSection {
                    section_name: "Ward 2".to_string(),
                    voters: vec![
                        voter("B000000001", "male", 61),
                        voter("B000000002", "other", 45),
                    ],
                },
            ],
            ..Default::default()
        };
        let id = insert_document(&db, &doc).unwrap();
        (db, id)
    }

    #[test]
    fn test_list_sections() {
        let (db, doc_id) = seed();
        let sections = list_sections_for_document(&db, doc_id).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].section_name, "Ward 1");
        assert_eq!(sections[1].section_name, "Ward 2");
    }

    #[test]
    fn test_gender_counts_for_document() {
        let (db, doc_id) = seed();
        let counts = gender_counts_for_document(&db, doc_id).unwrap();
        let get = |label: &str| counts.iter().find(|c| c.label == label).map(|c| c.count);
        assert_eq!(get("male"), Some(2));
        assert_eq!(get("female"), Some(2));
        assert_eq!(get("other"), Some(1));
    }

    #[test]
    fn test_gender_counts_for_section() {
        let (db, doc_id) = seed();
        let sections = list_sections_for_document(&db, doc_id).unwrap();
        let ward1 = &sections[0];

        let counts = gender_counts_for_section(&db, ward1.id).unwrap();
        let get = |label: &str| counts.iter().find(|c| c.label == label).map(|c| c.count);
        assert_eq!(get("male"), Some(1));
        assert_eq!(get("female"), Some(2));
        assert_eq!(get("other"), None);
    }

    #[test]
    fn test_age_distribution_for_document() {
        let (db, doc_id) = seed();
        let buckets = age_distribution_for_document(&db, doc_id).unwrap();
        let get = |label: &str| buckets.iter().find(|c| c.label == label).map(|c| c.count);
        assert_eq!(get("18-29"), Some(1));
        assert_eq!(get("30-39"), Some(2));
        assert_eq!(get("40-49"), Some(1));
        assert_eq!(get("60+"), Some(1));
    }

    #[test]
    fn test_empty_document_yields_no_counts() {
        let db = Database::open_in_memory().unwrap();
        let doc = NewDocument {
            file_name: "empty.pdf".to_string(),
            page_count: 1,
            pages_succeeded: 1,
            ..Default::default()
        };
        let id = insert_document(&db, &doc).unwrap();

        assert!(gender_counts_for_document(&db, id).unwrap().is_empty());
        assert!(age_distribution_for_document(&db, id).unwrap().is_empty());
    }
}
