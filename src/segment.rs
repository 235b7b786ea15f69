use crate::data::Row;
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn label(self) -> &'static str {
        match self {
            Sex::Male => "Masculino",
            Sex::Female => "Feminino",
        }
    }

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Sex::Male => &["MAS", "HOMEM"],
            Sex::Female => &["FEM", "MULHER"],
        }
    }
}

/// Inclusive age range; `max == None` is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub label: &'static str,
    pub min: i64,
    pub max: Option<i64>,
}

impl AgeRange {
    pub fn contains(&self, age: i64) -> bool {
        age >= self.min && self.max.is_none_or(|max| age <= max)
    }
}

pub const AGE_RANGES: [AgeRange; 4] = [
    AgeRange { label: "0-24", min: 0, max: Some(24) },
    AgeRange { label: "25-34", min: 25, max: Some(34) },
    AgeRange { label: "35-44", min: 35, max: Some(44) },
    AgeRange { label: "45plus", min: 45, max: None },
];

/// A named demographic bucket and its texts, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub label: String,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    /// Rows matching no sex keyword set or no age range.
    pub dropped_rows: usize,
}

pub struct Segmenter {
    male: Regex,
    female: Regex,
}

fn keyword_matcher(keywords: &[&str]) -> Result<Regex> {
    let pattern = keywords.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("failed to parse keyword pattern: {}", pattern))
}

impl Segmenter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            male: keyword_matcher(Sex::Male.keywords())?,
            female: keyword_matcher(Sex::Female.keywords())?,
        })
    }

    /// Male keywords are tested first so a row lands in at most one sex.
    pub fn classify_sex(&self, value: &str) -> Option<Sex> {
        if self.male.is_match(value) {
            Some(Sex::Male)
        } else if self.female.is_match(value) {
            Some(Sex::Female)
        } else {
            None
        }
    }

    pub fn bucket_of(&self, row: &Row) -> Option<(Sex, usize)> {
        let sex = self.classify_sex(&row.sexo)?;
        let age = row.age?;
        let range = AGE_RANGES.iter().position(|r| r.contains(age))?;
        Some((sex, range))
    }

    pub fn segment(&self, rows: &[Row]) -> Segmentation {
        let mut buckets: Vec<Vec<String>> = vec![Vec::new(); Sex::ALL.len() * AGE_RANGES.len()];
        let mut dropped_rows = 0usize;
        for row in rows {
            match self.bucket_of(row) {
                Some((sex, range)) => {
                    let slot = sex_index(sex) * AGE_RANGES.len() + range;
                    buckets[slot].push(row.st_text.clone());
                }
                None => dropped_rows += 1,
            }
        }

        let mut segments = Vec::new();
        for (slot, texts) in buckets.into_iter().enumerate() {
            if texts.is_empty() {
                continue;
            }
            let sex = Sex::ALL[slot / AGE_RANGES.len()];
            let range = AGE_RANGES[slot % AGE_RANGES.len()];
            let label = format!("{} {}", sex.label(), range.label);
            debug!("segment {} has {} rows", label, texts.len());
            segments.push(Segment { label, texts });
        }

        if dropped_rows > 0 {
            warn!("{} of {} rows matched no segment and were dropped", dropped_rows, rows.len());
        }
        Segmentation { segments, dropped_rows }
    }
}

fn sex_index(sex: Sex) -> usize {
    match sex {
        Sex::Male => 0,
        Sex::Female => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sexo: &str, age: Option<i64>, text: &str) -> Row {
        Row { sexo: sexo.into(), age, st_text: text.into() }
    }

    #[test]
    fn two_rows_land_in_their_buckets() {
        let seg = Segmenter::new().unwrap();
        let out = seg.segment(&[row("MASCULINO", Some(30), "A"), row("FEMININO", Some(20), "B")]);
        assert_eq!(
            out.segments,
            vec![
                Segment { label: "Masculino 25-34".into(), texts: vec!["A".into()] },
                Segment { label: "Feminino 0-24".into(), texts: vec!["B".into()] },
            ]
        );
        assert_eq!(out.dropped_rows, 0);
    }

    #[test]
    fn keywords_are_case_insensitive_substrings() {
        let seg = Segmenter::new().unwrap();
        assert_eq!(seg.classify_sex("masculino"), Some(Sex::Male));
        assert_eq!(seg.classify_sex("Homem"), Some(Sex::Male));
        assert_eq!(seg.classify_sex("sexo feminino"), Some(Sex::Female));
        assert_eq!(seg.classify_sex("mulher"), Some(Sex::Female));
        assert_eq!(seg.classify_sex("M"), None);
        assert_eq!(seg.classify_sex(""), None);
    }

    #[test]
    fn range_boundaries_are_inclusive_and_last_is_open() {
        let seg = Segmenter::new().unwrap();
        let cases = [(0, 0), (24, 0), (25, 1), (34, 1), (35, 2), (44, 2), (45, 3), (120, 3)];
        for (age, expected) in cases {
            assert_eq!(seg.bucket_of(&row("FEM", Some(age), "")), Some((Sex::Female, expected)), "age {}", age);
        }
        assert_eq!(seg.bucket_of(&row("FEM", Some(-1), "")), None);
        assert_eq!(seg.bucket_of(&row("FEM", None, "")), None);
    }

    #[test]
    fn every_row_in_at_most_one_bucket_and_matches_it() {
        let seg = Segmenter::new().unwrap();
        let sexes = ["MASCULINO", "feminino", "Homem", "MULHER", "outro", ""];
        let mut rows = Vec::new();
        for (i, s) in sexes.iter().enumerate() {
            for age in [-5, 0, 18, 24, 25, 33, 40, 44, 45, 70] {
                rows.push(row(s, Some(age), &format!("{}-{}", i, age)));
            }
            rows.push(row(s, None, &format!("{}-none", i)));
        }
        let out = seg.segment(&rows);

        let placed: usize = out.segments.iter().map(|s| s.texts.len()).sum();
        assert_eq!(placed + out.dropped_rows, rows.len());

        for segment in &out.segments {
            for text in &segment.texts {
                let r = rows.iter().find(|r| &r.st_text == text).unwrap();
                let (sex, range) = seg.bucket_of(r).unwrap();
                assert_eq!(segment.label, format!("{} {}", sex.label(), AGE_RANGES[range].label));
            }
        }
    }

    #[test]
    fn keeps_row_order_and_drops_empty_buckets() {
        let seg = Segmenter::new().unwrap();
        let out = seg.segment(&[row("MAS", Some(50), "first"), row("MAS", Some(60), "second")]);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].label, "Masculino 45plus");
        assert_eq!(out.segments[0].texts, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn empty_table_yields_no_segments() {
        let out = Segmenter::new().unwrap().segment(&[]);
        assert!(out.segments.is_empty());
        assert_eq!(out.dropped_rows, 0);
    }
}
