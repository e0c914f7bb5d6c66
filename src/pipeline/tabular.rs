//! Delimited-text serialization of a structured table.

use csv::{QuoteStyle, Terminator, WriterBuilder};

/// Serialize `columns` as the header row followed by `rows`, every field quoted.
///
/// Rows are written as given, even when their length differs from the header.
pub fn to_csv(columns: &[String], rows: &[Vec<String>]) -> Result<String, csv::Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .flexible(true)
        .from_writer(Vec::<u8>::new());

    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    // Every field went in as a `String`.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
