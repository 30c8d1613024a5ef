//! Fixed extraction prompts, one per page role.
//!
//! Prompt text lives here so it can evolve without touching retry or
//! parsing logic. Each prompt pins the exact JSON keys the parser expects.

use super::PageKind;

pub const HEADER_PROMPT: &str = "\
Perform OCR on this image. It is the header/metadata page of a scanned \
electoral roll. Respond with a single valid JSON object and nothing else, \
using exactly these keys:

- \"roll_title\": the main roll title as printed.
- \"assembly_constituency\": the constituency number and name (e.g. \"42-North\").
- \"part_number\": the part number printed at the top right, as a number.
- \"publication_date\": the publication date in YYYY-MM-DD form.
- \"district\": the district name.
- \"polling_station\": the polling station number and name.

If a field is not present or unreadable, use null for that key but keep \
the key in the object.
";

pub const RECORDS_PROMPT: &str = "\
You extract structured voter entries from scanned electoral roll pages. \
The page is a grid of numbered voter boxes in rows and columns. Process \
the grid row by row, left to right, and emit one JSON object per voter on \
its own line (JSON Lines). Output only JSON objects, no other text.

First identify the section name printed at the top of the page.

Each object must use exactly these keys:
- \"serial_no\": the voter's serial number, as a number.
- \"full_name\": the voter's complete name, with any surname parts joined.
- \"relative_name\": the complete father/husband/mother name, or null.
- \"relation_type\": \"F\" for father, \"H\" for husband, \"M\" for mother, \"O\" otherwise.
- \"house_no\": the house number as printed.
- \"age\": the age as a number.
- \"gender\": \"male\", \"female\", or \"other\".
- \"id_card_no\": the voter id card number. This key is required; an entry \
without it is unusable.
- \"status_type\": \"D\" if a DELETED stamp covers the box, \"M\" if the serial \
number is marked with '#', otherwise \"N\".
- \"section_name\": the section name identified at the top of the page, \
repeated verbatim on every object.
- \"raw_text\": all raw text inside this voter's box.

Before finishing, sweep the grid once more to make sure no box was missed. \
Favour completeness over speed.
";

pub const FOOTER_PROMPT: &str = "\
Perform OCR on this image. It is the final summary page of a scanned \
electoral roll. Respond with a single valid JSON object and nothing else, \
in this shape:

{
  \"assembly_constituency\": \"<constituency number and name>\",
  \"part_number\": <part number>,
  \"rows\": [
    {
      \"description\": \"<row description as printed>\",
      \"male_count\": <number>,
      \"female_count\": <number>,
      \"other_count\": <number>,
      \"total_count\": <number>
    }
  ]
}

Include one entry in \"rows\" for every line of the summary table. Use null \
for unreadable numbers.
";

/// Returns the fixed prompt for a page role.
pub fn prompt_for(kind: PageKind) -> &'static str {
    match kind {
        PageKind::Header => HEADER_PROMPT,
        PageKind::Records => RECORDS_PROMPT,
        PageKind::Footer => FOOTER_PROMPT,
    }
}
