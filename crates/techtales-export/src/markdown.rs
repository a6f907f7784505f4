//! Markdown export for finished lessons.
//!
//! The document has a title, a metadata table, the story, one figure per
//! visual cue (linked to the PNG files written by [`crate::write_bundle`])
//! and the quiz with answers and explanations.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use techtales_orchestrator::{Lesson, QuizQuestion};

use crate::bundle::diagram_file_name;

/// Labels for the four quiz options.
const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Shown in the metadata table for lessons that were never stored.
const NOT_SAVED: &str = "not saved";

/// Renders a [`Lesson`] as Markdown.
pub struct MarkdownExporter<'a> {
    lesson: &'a Lesson,
}

impl<'a> MarkdownExporter<'a> {
    /// Creates an exporter for `lesson`.
    #[must_use]
    pub const fn new(lesson: &'a Lesson) -> Self {
        Self { lesson }
    }

    /// Renders the complete document.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_metadata(&mut output);
        self.write_story(&mut output);
        self.write_figures(&mut output);
        self.write_quiz(&mut output);

        let mut output = output.trim_end().to_string();
        output.push('\n');
        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(output, "# {}\n", escape_markdown(&self.lesson.topic));
    }

    fn write_metadata(&self, output: &mut String) {
        let lesson = self.lesson;
        let id = lesson.id.as_deref().unwrap_or(NOT_SAVED);
        let created = lesson
            .created_at
            .as_ref()
            .map_or_else(|| NOT_SAVED.to_string(), format_timestamp);

        let _ = writeln!(output, "| Field | Value |");
        let _ = writeln!(output, "|-------|-------|");
        let _ = writeln!(output, "| Age Group | {} |", lesson.age_group);
        let _ = writeln!(output, "| Difficulty | {} |", lesson.difficulty);
        let _ = writeln!(output, "| Lesson ID | {} |", escape_markdown(id));
        let _ = writeln!(output, "| Created | {created} |");
        let _ = writeln!(output, "| Figures | {} |", lesson.images.len());
        let _ = writeln!(output, "| Quiz Questions | {} |", lesson.quiz.len());
        let _ = writeln!(output);
    }

    fn write_story(&self, output: &mut String) {
        let _ = writeln!(output, "## Story\n");
        let _ = writeln!(output, "{}\n", self.lesson.story.trim());
    }

    fn write_figures(&self, output: &mut String) {
        let _ = writeln!(output, "## Figures\n");

        if self.lesson.images.is_empty() {
            let _ = writeln!(output, "No diagrams were generated for this lesson.\n");
            return;
        }

        for (index, (cue, _)) in self.lesson.figures().enumerate() {
            let number = index + 1;
            let _ = writeln!(
                output,
                "![Figure {number}]({})\n",
                diagram_file_name(number)
            );
            let _ = writeln!(output, "*Figure {number}: {}*\n", escape_markdown(cue));
        }
    }

    fn write_quiz(&self, output: &mut String) {
        let _ = writeln!(output, "## Quiz\n");

        if self.lesson.quiz.is_empty() {
            let _ = writeln!(output, "No quiz is available for this lesson.\n");
            return;
        }

        for (index, question) in self.lesson.quiz.iter().enumerate() {
            Self::write_question(output, index + 1, question);
        }
    }

    fn write_question(output: &mut String, number: usize, question: &QuizQuestion) {
        let _ = writeln!(output, "### Question {number}\n");
        let _ = writeln!(output, "{}\n", escape_markdown(question.question()));

        for (label, option) in OPTION_LABELS.iter().zip(question.options()) {
            let _ = writeln!(output, "- {label}. {}", escape_markdown(option));
        }
        let _ = writeln!(output);

        let label = OPTION_LABELS
            .get(question.correct_index())
            .copied()
            .unwrap_or('?');
        let _ = writeln!(
            output,
            "**Answer**: {label}. {}\n",
            escape_markdown(question.correct_answer())
        );

        if !question.explanation().is_empty() {
            let _ = writeln!(
                output,
                "**Explanation**: {}\n",
                escape_markdown(question.explanation())
            );
        }
    }
}

/// Formats a timestamp as "YYYY-MM-DD HH:MM:SS UTC".
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes characters Markdown would treat as formatting.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' | '\r' => result.push(' '),
            _ => result.push(ch),
        }
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use techtales_orchestrator::{AgeGroup, DiagramImage, Difficulty, LessonRequest};

    fn question() -> QuizQuestion {
        QuizQuestion::new(
            "What does the client send first?",
            vec![
                "SYN".to_string(),
                "ACK".to_string(),
                "FIN".to_string(),
                "RST".to_string(),
            ],
            "SYN",
            "SYN opens the connection.",
        )
        .unwrap()
    }

    fn sample_lesson() -> Lesson {
        let request =
            LessonRequest::new("TCP handshake", AgeGroup::Teen, Difficulty::Beginner, 200).unwrap();
        let mut lesson = Lesson::assemble(
            &request,
            "Ana sent a SYN.\n\nBen replied with SYN-ACK.\n".to_string(),
            vec!["Client and server exchanging three packets".to_string()],
            vec![DiagramImage::new(vec![1, 2, 3])],
            vec![question()],
        )
        .unwrap();
        lesson.id = Some("3f2b8c1e-5d4a-4c3b-9a2f-1e0d9c8b7a60".to_string());
        lesson.created_at = Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
        lesson
    }

    #[test]
    fn test_generate_full_lesson() {
        let markdown = MarkdownExporter::new(&sample_lesson()).generate();
        insta::assert_snapshot!(markdown, @r###"
        # TCP handshake

        | Field | Value |
        |-------|-------|
        | Age Group | teen |
        | Difficulty | beginner |
        | Lesson ID | 3f2b8c1e-5d4a-4c3b-9a2f-1e0d9c8b7a60 |
        | Created | 2026-01-02 03:04:05 UTC |
        | Figures | 1 |
        | Quiz Questions | 1 |

        ## Story

        Ana sent a SYN.

        Ben replied with SYN-ACK.

        ## Figures

        ![Figure 1](diagram-1.png)

        *Figure 1: Client and server exchanging three packets*

        ## Quiz

        ### Question 1

        What does the client send first?

        - A. SYN
        - B. ACK
        - C. FIN
        - D. RST

        **Answer**: A. SYN

        **Explanation**: SYN opens the connection.
        "###);
    }

    #[test]
    fn test_generate_unsaved_lesson_without_extras() {
        let mut lesson = sample_lesson();
        lesson.id = None;
        lesson.created_at = None;
        lesson.visual_cues.clear();
        lesson.images.clear();
        lesson.quiz.clear();

        let markdown = MarkdownExporter::new(&lesson).generate();
        assert!(markdown.contains("| Lesson ID | not saved |"));
        assert!(markdown.contains("| Created | not saved |"));
        assert!(markdown.contains("No diagrams were generated for this lesson."));
        assert!(markdown.contains("No quiz is available for this lesson."));
        assert!(!markdown.contains("![Figure"));
        assert!(markdown.ends_with("lesson.\n"));
    }

    #[test]
    fn test_answer_label_follows_option_position() {
        let mut lesson = sample_lesson();
        lesson.quiz = vec![QuizQuestion::new(
            "Which flag closes a connection?",
            vec![
                "SYN".to_string(),
                "ACK".to_string(),
                "FIN".to_string(),
                "PSH".to_string(),
            ],
            "FIN",
            "",
        )
        .unwrap()];

        let markdown = MarkdownExporter::new(&lesson).generate();
        assert!(markdown.contains("**Answer**: C. FIN"));
        assert!(!markdown.contains("**Explanation**"));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a | b"), "a \\| b");
        assert_eq!(escape_markdown("**bold**"), "\\*\\*bold\\*\\*");
        assert_eq!(escape_markdown("line\nbreak"), "line break");
        assert_eq!(escape_markdown("plain text"), "plain text");
    }

    #[test]
    fn test_topic_is_escaped_in_title() {
        let mut lesson = sample_lesson();
        lesson.topic = "C# basics".to_string();
        let markdown = MarkdownExporter::new(&lesson).generate();
        assert!(markdown.starts_with("# C\\# basics\n"));
    }
}
