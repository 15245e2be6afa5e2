//! Folds normalized records and the original feeds into the weekly report:
//! subject sections, an "Other Topics" catch-all, verbatim notes, and the
//! deduplicated answer appendix. `plan_report` is a pure fold so ordering
//! and dedup behavior can be tested without touching the document library;
//! `render_docx` serializes the plan and writes the file.

use anyhow::{Context, Result};
use docx_rs::{BreakType, Docx, Paragraph, Run, Table, TableCell, TableRow};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::model::{EducationalRecord, Feed, QuizPair, SectionContent, Topic};

/// Maximum characters of feed content shown in the Other Topics preview.
const PREVIEW_CHARS: usize = 100;

/// Deterministic plan of the assembled document.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    pub subjects: Vec<SubjectSection>,
    /// Content previews for feeds no educational record covers
    pub other_topics: Vec<String>,
    /// Verbatim notes: feed-carried first, then classifier-aggregated
    pub notes: Vec<String>,
    pub appendix: Vec<AppendixGroup>,
}

/// One subject's merged content. First record for a subject wins the
/// teacher/date metadata; later records only contribute topics.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSection {
    pub subject_name: String,
    pub teacher_name: String,
    pub date: String,
    pub topics: Vec<Topic>,
}

/// Answer-key entries for one `(subject, topic)` pair, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendixGroup {
    pub subject: String,
    pub topic: String,
    pub entries: Vec<QuizPair>,
}

/// Build the report plan. Deterministic: the same records and feeds in the
/// same order produce an identical plan.
pub fn plan_report(
    records: &[EducationalRecord],
    feeds: &[Feed],
    classifier_notes: &[String],
    grade: &str,
    week: u32,
) -> Report {
    let title = format!("{} Weekly Study Material - Week {}", grade, week);

    // Group records by subject, first occurrence wins metadata
    let mut subjects: Vec<SubjectSection> = Vec::new();
    for record in records {
        match subjects
            .iter_mut()
            .find(|s| s.subject_name == record.subject_name)
        {
            Some(existing) => existing.topics.extend(record.topics.iter().cloned()),
            None => subjects.push(SubjectSection {
                subject_name: record.subject_name.clone(),
                teacher_name: record.teacher_name.clone(),
                date: record.date.clone(),
                topics: record.topics.clone(),
            }),
        }
    }

    // Collect the answer key while walking quiz sections, deduplicating
    // exact (subject, topic, question) triples; first occurrence is kept
    let mut appendix: Vec<AppendixGroup> = Vec::new();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    for subject in &subjects {
        for topic in &subject.topics {
            for section in &topic.sections {
                let SectionContent::Quiz(pairs) = &section.content else {
                    continue;
                };
                for pair in pairs {
                    let key = (
                        subject.subject_name.clone(),
                        topic.topic_name.clone(),
                        pair.question.trim().to_string(),
                    );
                    if !seen.insert(key) {
                        continue;
                    }
                    let group = match appendix.iter_mut().find(|g| {
                        g.subject == subject.subject_name && g.topic == topic.topic_name
                    }) {
                        Some(g) => g,
                        None => {
                            appendix.push(AppendixGroup {
                                subject: subject.subject_name.clone(),
                                topic: topic.topic_name.clone(),
                                entries: Vec::new(),
                            });
                            appendix.last_mut().unwrap()
                        }
                    };
                    group.entries.push(pair.clone());
                }
            }
        }
    }

    // Feeds no record covers land in Other Topics as truncated previews
    let other_topics = feeds
        .iter()
        .filter(|feed| !feed_is_covered(feed, records))
        .map(|feed| preview(&feed.content))
        .collect();

    // Feed-carried notes come first, classifier notes after; exact repeats
    // between the two sources render once
    let mut notes: Vec<String> = Vec::new();
    let mut seen_notes: HashSet<&str> = HashSet::new();
    for note in feeds
        .iter()
        .filter_map(|feed| feed.note.as_deref())
        .chain(classifier_notes.iter().map(String::as_str))
    {
        if seen_notes.insert(note) {
            notes.push(note.to_string());
        }
    }

    Report {
        title,
        subjects,
        other_topics,
        notes,
        appendix,
    }
}

/// A feed is covered when some educational record's subject or topic name
/// occurs (case-insensitively) in the feed's subject line or content.
fn feed_is_covered(feed: &Feed, records: &[EducationalRecord]) -> bool {
    let haystack = format!("{} {}", feed.subject, feed.content).to_lowercase();
    records.iter().any(|record| {
        let subject = record.subject_name.to_lowercase();
        if !subject.is_empty() && haystack.contains(&subject) {
            return true;
        }
        record.topics.iter().any(|topic| {
            let name = topic.topic_name.to_lowercase();
            !name.is_empty() && haystack.contains(&name)
        })
    })
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

/// Serialize the report with docx-rs and write `week{n}_material.docx` under
/// `out_dir` (created if absent). Document-library errors propagate.
pub fn render_docx(report: &Report, out_dir: impl AsRef<Path>, week: u32) -> Result<PathBuf> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;
    let path = out_dir.join(format!("week{}_material.docx", week));

    let mut docx = Docx::new().add_paragraph(heading(&report.title, 40));

    for subject in &report.subjects {
        docx = docx.add_paragraph(heading(&subject.subject_name, 32));
        let mut meta = format!("Teacher: {}", subject.teacher_name);
        if !subject.date.is_empty() {
            meta.push_str(&format!(" ({})", subject.date));
        }
        docx = docx.add_paragraph(plain(&meta));

        for topic in &subject.topics {
            docx = docx.add_paragraph(heading(&topic.topic_name, 28));
            for section in &topic.sections {
                if !section.name.is_empty() {
                    docx = docx.add_paragraph(heading(&section.name, 24));
                }
                docx = match &section.content {
                    SectionContent::Text(text) => {
                        let mut d = docx;
                        for line in text.lines().filter(|l| !l.trim().is_empty()) {
                            d = d.add_paragraph(plain(line));
                        }
                        d
                    }
                    SectionContent::Vocabulary(rows) => {
                        let mut table_rows = vec![TableRow::new(vec![
                            header_cell("Word"),
                            header_cell("Meaning"),
                            header_cell("Example"),
                        ])];
                        for row in rows {
                            table_rows.push(TableRow::new(vec![
                                text_cell(&row.name),
                                text_cell(&row.meaning),
                                text_cell(&row.example),
                            ]));
                        }
                        docx.add_table(Table::new(table_rows))
                    }
                    // Questions only; answers are withheld until the appendix
                    SectionContent::Quiz(pairs) => {
                        let mut d = docx;
                        for (i, pair) in pairs.iter().enumerate() {
                            d = d.add_paragraph(plain(&format!("{}. {}", i + 1, pair.question)));
                        }
                        d
                    }
                };
            }
        }
    }

    if !report.other_topics.is_empty() {
        docx = docx.add_paragraph(heading("Other Topics", 32));
        for entry in &report.other_topics {
            docx = docx.add_paragraph(plain(&format!("- {}", entry)));
        }
    }

    if !report.notes.is_empty() {
        docx = docx.add_paragraph(heading("Important Notes", 32));
        for note in &report.notes {
            docx = docx.add_paragraph(plain(note));
        }
    }

    docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
    docx = docx.add_paragraph(heading("Appendix: Answers", 32));
    for group in &report.appendix {
        docx = docx.add_paragraph(heading(
            &format!("{} / {}", group.subject, group.topic),
            26,
        ));
        for (i, pair) in group.entries.iter().enumerate() {
            docx = docx.add_paragraph(plain(&format!("{}. {}", i + 1, pair.question)));
            docx = docx.add_paragraph(plain(&format!("   Answer: {}", pair.answer)));
        }
    }

    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create document {}", path.display()))?;
    docx.build()
        .pack(file)
        .with_context(|| format!("failed to write document {}", path.display()))?;

    info!(path = %path.display(), "study material written");
    Ok(path)
}

fn heading(text: &str, half_points: usize) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).bold().size(half_points))
}

fn plain(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn header_cell(text: &str) -> TableCell {
    TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text).bold()))
}

fn text_cell(text: &str) -> TableCell {
    TableCell::new().add_paragraph(plain(text))
}
