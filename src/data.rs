use anyhow::{bail, Context, Result};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

pub const SEX_COLUMN: &str = "sexo";
pub const AGE_COLUMN: &str = "age";
pub const TEXT_COLUMN: &str = "st_text";

/// One survey answer. Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub sexo: String,
    /// `None` when the cell is empty or not an integer.
    pub age: Option<i64>,
    pub st_text: String,
}

pub async fn load_rows_async(path: &Path, delimiter: u8) -> Result<Vec<Row>> {
    if !path.exists() {
        bail!("file not found: {}", path.display());
    }
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading file: {}", path.display()))?;
    let rows = parse_rows(&data, delimiter).with_context(|| format!("loading table: {}", path.display()))?;
    info!("loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn parse_rows(data: &[u8], delimiter: u8) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(Cursor::new(data));

    let headers: Vec<String> = reader
        .headers()
        .context("failed to parse header row")?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();
    debug!("columns: {:?}", headers);

    let sex_idx = column_index(&headers, SEX_COLUMN)?;
    let age_idx = column_index(&headers, AGE_COLUMN)?;
    let text_idx = column_index(&headers, TEXT_COLUMN)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to parse record {}", line + 1))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("");
        rows.push(Row {
            sexo: cell(sex_idx).to_string(),
            age: parse_age(cell(age_idx)),
            st_text: cell(text_idx).to_string(),
        });
    }
    Ok(rows)
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    match headers.iter().position(|h| h == name) {
        Some(idx) => Ok(idx),
        None => bail!("column '{}' is missing from the table", name),
    }
}

/// Accepts integers and integral floats such as `30.0`.
pub fn parse_age(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if let Ok(v) = cell.parse::<i64>() {
        return Some(v);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_case_insensitive_headers() {
        let data = b"id,SEXO, Age ,st_text\n1,MASCULINO,30,hello\n2,Feminino,,world\n";
        let rows = parse_rows(data, b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Row { sexo: "MASCULINO".into(), age: Some(30), st_text: "hello".into() });
        assert_eq!(rows[1].age, None);
    }

    #[test]
    fn missing_sex_column_is_an_error() {
        let err = parse_rows(b"gender,age,st_text\nM,30,x\n", b',').unwrap_err();
        assert!(err.to_string().contains("column 'sexo' is missing"));
    }

    #[test]
    fn missing_age_or_text_column_is_named() {
        let err = parse_rows(b"sexo,st_text\nMAS,x\n", b',').unwrap_err();
        assert!(err.to_string().contains("column 'age' is missing"));
        let err = parse_rows(b"sexo,age\nMAS,30\n", b',').unwrap_err();
        assert!(err.to_string().contains("column 'st_text' is missing"));
    }

    #[test]
    fn honours_delimiter() {
        let rows = parse_rows(b"sexo;age;st_text\nFEM;22;\"a; b\"\n", b';').unwrap();
        assert_eq!(rows[0].st_text, "a; b");
        assert_eq!(rows[0].age, Some(22));
    }

    #[test]
    fn age_cells() {
        assert_eq!(parse_age(" 41 "), Some(41));
        assert_eq!(parse_age("30.0"), Some(30));
        assert_eq!(parse_age("30.5"), None);
        assert_eq!(parse_age("n/a"), None);
        assert_eq!(parse_age("NaN"), None);
    }

    #[test]
    fn header_only_table_is_empty() {
        assert!(parse_rows(b"sexo,age,st_text\n", b',').unwrap().is_empty());
    }
}
