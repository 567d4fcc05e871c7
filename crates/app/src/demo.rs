//! Demo catalog loaded by `quiz seed`.

use anyhow::Context;
use services::{CatalogService, CatalogServiceError, ExamDraft, QuestionDraft};
use tracing::info;

struct DemoQuestion {
    id: &'static str,
    prompt: &'static str,
    options: &'static [&'static str],
    correct: usize,
    explanation: &'static str,
}

struct DemoExam {
    id: &'static str,
    title: &'static str,
    subject: &'static str,
    description: &'static str,
    minutes: u32,
    questions: &'static [DemoQuestion],
}

const SUBJECTS: &[(&str, &str)] = &[
    ("HTML", "Document structure and semantic markup"),
    ("CSS", "Styling, layout and the cascade"),
    ("JavaScript", "The language of the browser"),
    ("Data Analysis", "Summaries, charts and spreadsheets"),
];

const EXAMS: &[DemoExam] = &[
    DemoExam {
        id: "html-basics",
        title: "HTML Basics",
        subject: "HTML",
        description: "Elements, attributes and document structure.",
        minutes: 10,
        questions: &[
            DemoQuestion {
                id: "doctype",
                prompt: "Which declaration starts an HTML5 document?",
                options: &["<!DOCTYPE html>", "<html5>", "<?xml version=\"1.0\"?>", "<doctype=html5>"],
                correct: 0,
                explanation: "HTML5 uses the short <!DOCTYPE html> declaration.",
            },
            DemoQuestion {
                id: "link-tag",
                prompt: "Which element creates a hyperlink?",
                options: &["<link>", "<a>", "<href>", "<nav>"],
                correct: 1,
                explanation: "<a> with an href attribute creates a hyperlink; <link> relates external resources.",
            },
            DemoQuestion {
                id: "alt-text",
                prompt: "What is the alt attribute on <img> for?",
                options: &["Tooltip styling", "Lazy loading", "Alternative text for assistive tech", "Image caption"],
                correct: 2,
                explanation: "alt describes the image when it cannot be seen.",
            },
            DemoQuestion {
                id: "semantic-main",
                prompt: "Which element marks the dominant content of the page?",
                options: &["<section>", "<body>", "<article>", "<main>"],
                correct: 3,
                explanation: "There should be one visible <main> per document.",
            },
        ],
    },
    DemoExam {
        id: "css-layout",
        title: "CSS Layout",
        subject: "CSS",
        description: "Box model, flexbox and grid.",
        minutes: 8,
        questions: &[
            DemoQuestion {
                id: "box-sizing",
                prompt: "Which box-sizing value includes padding and border in the width?",
                options: &["content-box", "border-box", "padding-box", "inherit"],
                correct: 1,
                explanation: "border-box makes width cover content, padding and border.",
            },
            DemoQuestion {
                id: "flex-axis",
                prompt: "In a row flex container, justify-content aligns items along which axis?",
                options: &["Main axis", "Cross axis", "Block axis", "Both axes"],
                correct: 0,
                explanation: "justify-content works on the main axis; align-items on the cross axis.",
            },
            DemoQuestion {
                id: "grid-fr",
                prompt: "What does the fr unit represent in CSS grid?",
                options: &["Font ratio", "Fixed rem", "A fraction of the free space", "Frame rate"],
                correct: 2,
                explanation: "fr distributes the remaining space in the grid container.",
            },
        ],
    },
    DemoExam {
        id: "js-fundamentals",
        title: "JavaScript Fundamentals",
        subject: "JavaScript",
        description: "Types, scope and equality.",
        minutes: 12,
        questions: &[
            DemoQuestion {
                id: "strict-equality",
                prompt: "What does 0 === \"0\" evaluate to?",
                options: &["true", "false", "TypeError", "undefined"],
                correct: 1,
                explanation: "Strict equality compares types; number and string differ.",
            },
            DemoQuestion {
                id: "let-scope",
                prompt: "What scope does a let declaration have?",
                options: &["Function", "Global", "Block", "Module only"],
                correct: 2,
                explanation: "let and const are block scoped.",
            },
            DemoQuestion {
                id: "typeof-null",
                prompt: "What does typeof null return?",
                options: &["\"null\"", "\"undefined\"", "\"object\"", "\"number\""],
                correct: 2,
                explanation: "A long-standing quirk: typeof null is \"object\".",
            },
            DemoQuestion {
                id: "array-map",
                prompt: "Which array method returns a new array of transformed elements?",
                options: &["forEach", "map", "reduce", "some"],
                correct: 1,
                explanation: "map returns a new array; forEach returns undefined.",
            },
            DemoQuestion {
                id: "promise-all",
                prompt: "When does Promise.all reject?",
                options: &["When all reject", "Never", "After a timeout", "As soon as any input rejects"],
                correct: 3,
                explanation: "Promise.all rejects with the first rejection.",
            },
        ],
    },
    DemoExam {
        id: "data-summaries",
        title: "Descriptive Statistics",
        subject: "Data Analysis",
        description: "Centre and spread of a dataset.",
        minutes: 5,
        questions: &[
            DemoQuestion {
                id: "median",
                prompt: "What is the median of 3, 1, 4, 1, 5?",
                options: &["1", "3", "2.8", "4"],
                correct: 1,
                explanation: "Sorted: 1, 1, 3, 4, 5; the middle value is 3.",
            },
            DemoQuestion {
                id: "outliers",
                prompt: "Which measure of centre is least affected by outliers?",
                options: &["Mean", "Median", "Range", "Variance"],
                correct: 1,
                explanation: "The median depends only on the middle of the ordered data.",
            },
        ],
    },
];

impl DemoExam {
    fn draft(&self) -> ExamDraft {
        ExamDraft {
            id: self.id.to_owned(),
            title: self.title.to_owned(),
            subject: self.subject.to_owned(),
            description: Some(self.description.to_owned()),
            time_limit_minutes: self.minutes,
            questions: self
                .questions
                .iter()
                .map(|q| QuestionDraft {
                    id: q.id.to_owned(),
                    prompt: q.prompt.to_owned(),
                    options: q.options.iter().map(|o| (*o).to_owned()).collect(),
                    correct_index: q.correct,
                    explanation: Some(q.explanation.to_owned()),
                })
                .collect(),
        }
    }
}

/// Creates missing subjects and replaces the demo exams. Returns the exam count.
pub async fn seed(catalog: &CatalogService) -> anyhow::Result<usize> {
    for &(name, description) in SUBJECTS {
        match catalog.create_subject(name, Some(description)).await {
            Ok(_) | Err(CatalogServiceError::DuplicateSubject) => {}
            Err(e) => return Err(e).with_context(|| format!("creating subject {name}")),
        }
    }

    for exam in EXAMS {
        catalog
            .save_exam(exam.draft())
            .await
            .with_context(|| format!("saving exam {}", exam.id))?;
    }
    info!(exams = EXAMS.len(), "demo catalog seeded");
    Ok(EXAMS.len())
}
