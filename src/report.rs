use crate::prompts;
use crate::summarize::{SegmentSummary, Summarizer};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub const DEFAULT_OUTPUT_FILE: &str = "relatorio_final.html";

/// Heading, paragraph and divider per segment, in segment order.
pub fn render_basic_markup(summaries: &[SegmentSummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        out.push_str(&format!("<h2>Faixa Etária: {}</h2>\n", s.label));
        out.push_str(&format!("<p>{}</p>\n", s.summary));
        out.push_str("<hr>\n");
    }
    out
}

pub fn strip_code_fences(text: &str) -> String {
    text.trim().replace("```html", "").replace("```", "")
}

/// Asks the model to restyle the basic markup. With nothing to style no call is made.
pub async fn style_report(summarizer: &mut Summarizer<'_>, basic: &str) -> Result<String> {
    if basic.is_empty() {
        return Ok(String::new());
    }
    let styled = summarizer
        .complete(prompts::user_style_report(basic))
        .await
        .context("styling the final report")?;
    Ok(strip_code_fences(&styled))
}

pub async fn write_report_async(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating dir: {}", parent.display()))?;
        }
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("writing file: {}", path.display()))?;
    info!("final report saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockAdapter;

    fn summary(label: &str, text: &str) -> SegmentSummary {
        SegmentSummary { label: label.into(), chunk_summaries: vec![], summary: text.into() }
    }

    #[test]
    fn basic_markup_per_segment() {
        let html = render_basic_markup(&[summary("Masculino 25-34", "A"), summary("Feminino 0-24", "B")]);
        assert_eq!(
            html,
            "<h2>Faixa Etária: Masculino 25-34</h2>\n<p>A</p>\n<hr>\n<h2>Faixa Etária: Feminino 0-24</h2>\n<p>B</p>\n<hr>\n"
        );
        assert_eq!(render_basic_markup(&[]), "");
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```html\n<html></html>\n```\n"), "\n<html></html>\n");
        assert_eq!(strip_code_fences("<p>x</p>"), "<p>x</p>");
    }

    #[tokio::test]
    async fn empty_report_skips_the_styling_call() {
        let mut s = Summarizer::new(&MockAdapter, "m", 0.5, None);
        assert_eq!(style_report(&mut s, "").await.unwrap(), "");
        assert_eq!(s.ledger().api_calls, 0);
    }

    #[tokio::test]
    async fn writes_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("r.html");
        write_report_async(&path, "<p>ok</p>").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<p>ok</p>");
    }
}
