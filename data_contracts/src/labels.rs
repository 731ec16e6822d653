use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// One row of the ground-truth table: an image id and its tamper label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    pub id: String,
    /// 1.0 when the document image was modified, 0.0 otherwise.
    pub modified: f32,
}

#[derive(Debug, Error)]
pub enum LabelTableError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("row {0} is missing an id or modified field")]
    MissingField(usize),
    #[error("row {row}: invalid modified value {value:?}")]
    InvalidModified { row: usize, value: String },
}

#[derive(Default)]
struct RowBuilder {
    id: Option<String>,
    modified: Option<String>,
}

enum RowField {
    Id,
    Modified,
}

/// Read the XML label table from disk.
pub fn read_label_table(path: &Path) -> Result<Vec<LabelRecord>, LabelTableError> {
    let text = fs::read_to_string(path)?;
    parse_label_table(&text)
}

/// Parse a label table where each depth-2 element is one row. The `id` and
/// `modified` fields may appear as attributes or as child elements.
pub fn parse_label_table(xml: &str) -> Result<Vec<LabelRecord>, LabelTableError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut depth = 0usize;
    let mut row: Option<RowBuilder> = None;
    let mut field: Option<RowField> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    let mut builder = RowBuilder::default();
                    fill_from_attributes(&e, &mut builder)?;
                    row = Some(builder);
                } else if depth == 3 && row.is_some() {
                    field = match e.local_name().as_ref() {
                        b"id" => Some(RowField::Id),
                        b"modified" => Some(RowField::Modified),
                        _ => None,
                    };
                }
            }
            Event::Empty(e) => {
                if depth == 1 {
                    let mut builder = RowBuilder::default();
                    fill_from_attributes(&e, &mut builder)?;
                    records.push(finish_row(builder, records.len())?);
                }
            }
            Event::Text(t) => {
                if let (Some(builder), Some(which)) = (row.as_mut(), field.as_ref()) {
                    let text = t.unescape()?.into_owned();
                    match which {
                        RowField::Id => builder.id = Some(text),
                        RowField::Modified => builder.modified = Some(text),
                    }
                }
            }
            Event::End(_) => {
                if depth == 3 {
                    field = None;
                } else if depth == 2 {
                    if let Some(builder) = row.take() {
                        records.push(finish_row(builder, records.len())?);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

fn fill_from_attributes(
    e: &quick_xml::events::BytesStart<'_>,
    builder: &mut RowBuilder,
) -> Result<(), LabelTableError> {
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"id" => builder.id = Some(value),
            b"modified" => builder.modified = Some(value),
            _ => {}
        }
    }
    Ok(())
}

fn finish_row(builder: RowBuilder, index: usize) -> Result<LabelRecord, LabelTableError> {
    let id = builder.id.ok_or(LabelTableError::MissingField(index))?;
    let raw = builder.modified.ok_or(LabelTableError::MissingField(index))?;
    let modified = raw
        .trim()
        .parse::<f32>()
        .map_err(|_| LabelTableError::InvalidModified {
            row: index,
            value: raw.clone(),
        })?;
    Ok(LabelRecord { id, modified })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_rows() {
        let xml = r#"<GT><doc id="img_001" modified="1"/><doc id="img_002" modified="0"/></GT>"#;
        let records = parse_label_table(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "img_001");
        assert_eq!(records[0].modified, 1.0);
        assert_eq!(records[1].modified, 0.0);
    }

    #[test]
    fn parses_element_rows() {
        let xml = "<table><row><id>42</id><modified>1</modified></row></table>";
        let records = parse_label_table(xml).unwrap();
        assert_eq!(records, vec![LabelRecord { id: "42".into(), modified: 1.0 }]);
    }

    #[test]
    fn rejects_non_numeric_modified() {
        let xml = r#"<GT><doc id="a" modified="yes"/></GT>"#;
        assert!(matches!(
            parse_label_table(xml),
            Err(LabelTableError::InvalidModified { .. })
        ));
    }

    #[test]
    fn rejects_missing_id() {
        let xml = r#"<GT><doc modified="1"/></GT>"#;
        assert!(matches!(
            parse_label_table(xml),
            Err(LabelTableError::MissingField(0))
        ));
    }
}
