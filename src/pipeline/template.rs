//! Template registry and selection.
//!
//! A template is a fixed LaTeX skeleton with named `[[slot]]` placeholders,
//! a slot layout (which slots exist, which are required, what their raw
//! LaTeX defaults are) and styling parameters. The registry is built once
//! at startup and shared read-only across runs — the only long-lived
//! resource in the pipeline.
//!
//! Selection is a strict precedence chain:
//!
//! 1. explicit user override — always wins;
//! 2. the classifier's suggested template — wins over the type default
//!    when confidence exceeds the override threshold;
//! 3. the document type's default template — an exhaustive match, so a new
//!    [`DocumentType`] variant fails to compile until it is mapped here.
//!
//! A resolved identifier with no registered spec is a configuration error
//! ([`Doc2TexError::UnknownTemplate`]), reported distinctly from runtime
//! classification problems.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Doc2TexError;
use crate::pipeline::classify::{DocumentAnalysis, DocumentType};

/// Identifiers of the built-in templates, in registry order.
pub const BUILTIN_TEMPLATE_IDS: [&str; 9] = [
    "academic_paper",
    "basic",
    "corporate_letter",
    "corporate_report",
    "government_circular",
    "government_memo",
    "government_notification",
    "government_report",
    "legal_standard",
];

/// One named content region of a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    /// Required slots must resolve to a value before assembly; the binder
    /// fails the run otherwise.
    pub required: bool,
    /// Raw LaTeX inserted verbatim when no value resolves. `None` on a
    /// non-required slot means the region simply renders empty.
    pub default: Option<String>,
}

impl SlotSpec {
    fn required(name: &str) -> Self {
        SlotSpec {
            name: name.into(),
            required: true,
            default: None,
        }
    }

    fn optional(name: &str, default: &str) -> Self {
        SlotSpec {
            name: name.into(),
            required: false,
            default: Some(default.into()),
        }
    }
}

/// Page margins, as LaTeX lengths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Margins {
    pub top: String,
    pub bottom: String,
    pub left: String,
    pub right: String,
}

impl Margins {
    fn cm(top: f32, bottom: f32, left: f32, right: f32) -> Self {
        Margins {
            top: format!("{top}cm"),
            bottom: format!("{bottom}cm"),
            left: format!("{left}cm"),
            right: format!("{right}cm"),
        }
    }
}

/// Styling parameters substituted into the skeleton preamble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Styling {
    /// RGB hex without the leading `#`, for `\definecolor{...}{HTML}{...}`.
    pub primary_color: String,
    pub accent_color: String,
    pub margins: Margins,
    pub base_font_pt: u8,
}

/// A registered document template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Slot layout in skeleton order.
    pub slots: Vec<SlotSpec>,
    pub styling: Styling,
    /// LaTeX skeleton with `[[slot]]` and `[[style:*]]` placeholders.
    #[serde(skip)]
    pub skeleton: String,
}

impl TemplateSpec {
    pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn required_slots(&self) -> impl Iterator<Item = &SlotSpec> {
        self.slots.iter().filter(|s| s.required)
    }
}

/// Process-wide, read-only template registry.
pub struct TemplateRegistry {
    templates: BTreeMap<String, TemplateSpec>,
}

impl TemplateRegistry {
    /// The built-in template set.
    pub fn builtin() -> Self {
        let mut registry = TemplateRegistry {
            templates: BTreeMap::new(),
        };
        for spec in builtin_specs() {
            registry.register(spec);
        }
        registry
    }

    /// Register (or replace) a template. Only meaningful before the
    /// registry is shared; afterwards it is read-only by convention.
    pub fn register(&mut self, spec: TemplateSpec) {
        self.templates.insert(spec.id.clone(), spec);
    }

    pub fn get(&self, id: &str) -> Option<&TemplateSpec> {
        self.templates.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.templates.values()
    }
}

/// Default template for each document type.
///
/// Exhaustive on purpose: extending [`DocumentType`] without deciding its
/// template is a compile error, not a silent fallthrough.
pub fn default_template_for(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::OfficeMemorandum => "government_memo",
        DocumentType::Circular => "government_circular",
        DocumentType::Notification => "government_notification",
        DocumentType::Report => "government_report",
        DocumentType::FinancialReport => "corporate_report",
        DocumentType::ResearchPaper => "academic_paper",
        DocumentType::AcademicPaper => "academic_paper",
        DocumentType::Letter => "corporate_letter",
        DocumentType::PolicyDocument => "government_circular",
        DocumentType::TenderDocument => "government_notification",
        DocumentType::LegalDocument => "legal_standard",
        DocumentType::Unknown => "basic",
    }
}

/// Resolve the template for an analysed document.
///
/// Precedence: user override > AI suggestion (above threshold) > type
/// default.
pub fn select<'a>(
    registry: &'a TemplateRegistry,
    analysis: &DocumentAnalysis,
    user_override: Option<&str>,
    override_threshold: f32,
) -> Result<&'a TemplateSpec, Doc2TexError> {
    let id: &str = match user_override {
        Some(id) => id,
        None if !analysis.suggested_template.is_empty()
            && analysis.confidence_score > override_threshold =>
        {
            &analysis.suggested_template
        }
        None => default_template_for(analysis.document_type),
    };

    debug!(template = id, "resolved template");

    registry.get(id).ok_or_else(|| Doc2TexError::UnknownTemplate {
        id: id.to_string(),
        known: registry.ids(),
    })
}

// ── Built-in template definitions ────────────────────────────────────────

fn builtin_specs() -> Vec<TemplateSpec> {
    let government = Styling {
        primary_color: "FF9933".into(),
        accent_color: "000080".into(),
        margins: Margins::cm(2.5, 2.5, 3.0, 2.5),
        base_font_pt: 11,
    };
    let corporate = Styling {
        primary_color: "00529B".into(),
        accent_color: "404040".into(),
        margins: Margins::cm(2.5, 2.5, 3.0, 2.5),
        base_font_pt: 11,
    };
    let academic = Styling {
        primary_color: "8B0000".into(),
        accent_color: "003366".into(),
        margins: Margins::cm(2.5, 2.5, 2.5, 2.5),
        base_font_pt: 12,
    };
    let legal = Styling {
        primary_color: "00008B".into(),
        accent_color: "00008B".into(),
        margins: Margins::cm(2.5, 2.5, 3.5, 2.5),
        base_font_pt: 12,
    };
    let plain = Styling {
        primary_color: "000000".into(),
        accent_color: "000000".into(),
        margins: Margins::cm(2.2, 2.2, 2.2, 2.2),
        base_font_pt: 11,
    };

    let official_slots = |kind: &str| {
        vec![
            SlotSpec::optional("doc_kind", kind),
            SlotSpec::optional("department", "Government of India"),
            SlotSpec::optional("file_no", r"\underline{\hspace{2.5cm}}"),
            SlotSpec::optional("date", r"\today"),
            SlotSpec::optional("classification", "Public"),
            SlotSpec::required("subject"),
            SlotSpec::required("body"),
            SlotSpec::optional("signatory", "~"),
        ]
    };

    let report_slots = || {
        vec![
            SlotSpec::required("title"),
            SlotSpec::optional("author", "~"),
            SlotSpec::optional("department", "~"),
            SlotSpec::optional("classification", "Public"),
            SlotSpec::optional("date", r"\today"),
            SlotSpec::optional("summary", "Summary to follow."),
            SlotSpec::required("body"),
        ]
    };

    vec![
        TemplateSpec {
            id: "government_memo".into(),
            name: "Government Memorandum".into(),
            description: "Official inter-departmental communication".into(),
            slots: official_slots("OFFICE MEMORANDUM"),
            styling: government.clone(),
            skeleton: OFFICIAL_SKELETON.into(),
        },
        TemplateSpec {
            id: "government_circular".into(),
            name: "Government Circular".into(),
            description: "Policy announcements and instructions".into(),
            slots: official_slots("CIRCULAR"),
            styling: government.clone(),
            skeleton: OFFICIAL_SKELETON.into(),
        },
        TemplateSpec {
            id: "government_notification".into(),
            name: "Government Notification".into(),
            description: "Official public notifications".into(),
            slots: official_slots("NOTIFICATION"),
            styling: government.clone(),
            skeleton: OFFICIAL_SKELETON.into(),
        },
        TemplateSpec {
            id: "government_report".into(),
            name: "Government Report".into(),
            description: "Detailed analysis and findings".into(),
            slots: report_slots(),
            styling: government,
            skeleton: REPORT_SKELETON.into(),
        },
        TemplateSpec {
            id: "corporate_report".into(),
            name: "Corporate Report".into(),
            description: "Business and financial reporting".into(),
            slots: report_slots(),
            styling: corporate.clone(),
            skeleton: REPORT_SKELETON.into(),
        },
        TemplateSpec {
            id: "academic_paper".into(),
            name: "Academic Paper".into(),
            description: "Research publications and papers".into(),
            slots: vec![
                SlotSpec::required("title"),
                SlotSpec::optional("author", "~"),
                SlotSpec::optional("department", "~"),
                SlotSpec::optional("date", r"\today"),
                SlotSpec::optional("abstract", ""),
                SlotSpec::optional("keywords", ""),
                SlotSpec::required("body"),
            ],
            styling: academic,
            skeleton: ACADEMIC_SKELETON.into(),
        },
        TemplateSpec {
            id: "legal_standard".into(),
            name: "Legal Document".into(),
            description: "Legal proceedings and agreements".into(),
            slots: vec![
                SlotSpec::required("title"),
                SlotSpec::optional("author", "~"),
                SlotSpec::optional("date", r"\today"),
                SlotSpec::required("body"),
            ],
            styling: legal,
            skeleton: LEGAL_SKELETON.into(),
        },
        TemplateSpec {
            id: "corporate_letter".into(),
            name: "Corporate Letter".into(),
            description: "Business communications".into(),
            slots: vec![
                SlotSpec::optional("date", r"\today"),
                SlotSpec::optional("department", "~"),
                SlotSpec::optional("subject", ""),
                SlotSpec::required("body"),
                SlotSpec::optional("signatory", "~"),
            ],
            styling: corporate,
            skeleton: LETTER_SKELETON.into(),
        },
        TemplateSpec {
            id: "basic".into(),
            name: "Basic Document".into(),
            description: "Simple document format".into(),
            slots: vec![
                SlotSpec::optional("title", "Document"),
                SlotSpec::optional("author", "~"),
                SlotSpec::optional("date", r"\today"),
                SlotSpec::required("body"),
            ],
            styling: plain,
            skeleton: MINIMAL_SKELETON.into(),
        },
    ]
}

// ── Skeletons ────────────────────────────────────────────────────────────
//
// Placeholders: [[name]] for slots, [[style:*]] for styling parameters.
// Everything else is fixed LaTeX that compiles with a stock TeX Live.

const OFFICIAL_SKELETON: &str = r#"\documentclass[[[style:font_pt]]pt,a4paper]{article}

\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\usepackage{xcolor}
\usepackage{fancyhdr}
\usepackage{titlesec}
\usepackage{enumitem}
\usepackage{hyperref}

\geometry{
    top=[[style:margin_top]],
    bottom=[[style:margin_bottom]],
    left=[[style:margin_left]],
    right=[[style:margin_right]],
    headheight=1.5cm,
    headsep=1cm
}

\definecolor{primary}{HTML}{[[style:primary]]}
\definecolor{accent}{HTML}{[[style:accent]]}

\pagestyle{fancy}
\fancyhf{}
\fancyhead[C]{%
    \begin{minipage}{\textwidth}
        \centering
        \textbf{\large [[department]]} \\[0.1cm]
        \rule{\textwidth}{0.5pt}
    \end{minipage}
}
\fancyfoot[C]{\thepage}
\fancyfoot[L]{\small Classification: [[classification]]}

\titleformat{\section}
    {\normalfont\Large\bfseries\color{accent}}
    {\thesection}{1em}{}
\titleformat{\subsection}
    {\normalfont\large\bfseries\color{primary}}
    {\thesubsection}{1em}{}

\begin{document}

\begin{center}
    {\Large \textbf{\color{primary}[[department]]}} \\[0.3cm]
    \rule{0.8\textwidth}{1pt}
\end{center}

\vspace{0.5cm}

\begin{flushleft}
    \textbf{File No.: }[[file_no]] \\[0.2cm]
    \textbf{Dated: }[[date]] \\[0.5cm]
\end{flushleft}

\begin{center}
    {\Large \textbf{\color{accent}[[doc_kind]]}} \\[0.5cm]
\end{center}

\textbf{Subject: }[[subject]]

\vspace{0.5cm}

[[body]]

\vspace{2cm}

\begin{flushright}
    \begin{minipage}{6cm}
        \centering
        \rule{5cm}{0.5pt} \\[0.2cm]
        ([[signatory]]) \\
        [[department]]
    \end{minipage}
\end{flushright}

\end{document}
"#;

const REPORT_SKELETON: &str = r#"\documentclass[[[style:font_pt]]pt,a4paper]{report}

\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\usepackage{xcolor}
\usepackage{fancyhdr}
\usepackage{titlesec}
\usepackage{hyperref}

\geometry{
    top=[[style:margin_top]],
    bottom=[[style:margin_bottom]],
    left=[[style:margin_left]],
    right=[[style:margin_right]]
}

\definecolor{primary}{HTML}{[[style:primary]]}
\definecolor{accent}{HTML}{[[style:accent]]}

\pagestyle{fancy}
\fancyhf{}
\fancyhead[L]{\small [[department]]}
\fancyhead[R]{\small Classification: [[classification]]}
\fancyfoot[C]{\thepage}

\titleformat{\chapter}
    {\normalfont\huge\bfseries\color{primary}}
    {\thechapter}{1em}{}
\titleformat{\section}
    {\normalfont\Large\bfseries\color{accent}}
    {\thesection}{1em}{}

\title{\Huge \textbf{\color{primary}[[title]]}}
\author{[[author]]}
\date{[[date]]}

\begin{document}

\maketitle

\tableofcontents

\chapter{Executive Summary}
[[summary]]

[[body]]

\end{document}
"#;

const ACADEMIC_SKELETON: &str = r#"\documentclass[[[style:font_pt]]pt,a4paper]{article}

\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\usepackage{xcolor}
\usepackage{titlesec}
\usepackage{abstract}
\usepackage{hyperref}

\geometry{
    top=[[style:margin_top]],
    bottom=[[style:margin_bottom]],
    left=[[style:margin_left]],
    right=[[style:margin_right]]
}

\definecolor{titlecolor}{HTML}{[[style:primary]]}
\definecolor{accent}{HTML}{[[style:accent]]}

\titleformat{\section}
    {\normalfont\large\bfseries\color{accent}}
    {\thesection}{1em}{}

\title{\Large \textbf{\color{titlecolor}[[title]]}}
\author{[[author]] \\ \small [[department]]}
\date{[[date]]}

\begin{document}

\maketitle

\begin{abstract}
[[abstract]]
\end{abstract}

\noindent\textbf{Keywords:} [[keywords]]

\tableofcontents
\newpage

[[body]]

\end{document}
"#;

const LEGAL_SKELETON: &str = r#"\documentclass[[[style:font_pt]]pt,a4paper]{article}

\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\usepackage{xcolor}
\usepackage{fancyhdr}
\usepackage{enumerate}

\geometry{
    top=[[style:margin_top]],
    bottom=[[style:margin_bottom]],
    left=[[style:margin_left]],
    right=[[style:margin_right]],
    headheight=1cm
}

\definecolor{legal}{HTML}{[[style:primary]]}

\pagestyle{fancy}
\fancyhf{}
\fancyhead[C]{\textbf{[[title]]}}
\fancyfoot[C]{\thepage}

\renewcommand{\thesection}{\Roman{section}}
\renewcommand{\thesubsection}{\arabic{subsection}}

\title{\textbf{\color{legal}[[title]]}}
\author{[[author]]}
\date{[[date]]}

\begin{document}

\maketitle

[[body]]

\end{document}
"#;

const LETTER_SKELETON: &str = r#"\documentclass[[[style:font_pt]]pt,a4paper]{article}

\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\usepackage{xcolor}

\geometry{
    top=[[style:margin_top]],
    bottom=[[style:margin_bottom]],
    left=[[style:margin_left]],
    right=[[style:margin_right]]
}

\definecolor{primary}{HTML}{[[style:primary]]}

\begin{document}

\begin{flushright}
    [[date]]
\end{flushright}

\begin{flushleft}
    \textbf{\color{primary}[[department]]}
\end{flushleft}

\vspace{0.5cm}

\textbf{Subject: }[[subject]]

\vspace{0.5cm}

[[body]]

\vspace{1.5cm}

\begin{flushright}
    \begin{minipage}{6cm}
        \centering
        [[signatory]] \\
        [[department]]
    \end{minipage}
\end{flushright}

\end{document}
"#;

const MINIMAL_SKELETON: &str = r#"\documentclass[[[style:font_pt]]pt,a4paper]{article}

\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}

\title{[[title]]}
\author{[[author]]}
\date{[[date]]}

\begin{document}

\maketitle

[[body]]

\end{document}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::AnalysisSource;
    use std::collections::BTreeMap;

    fn analysis(doc_type: DocumentType, suggested: &str, confidence: f32) -> DocumentAnalysis {
        DocumentAnalysis {
            document_type: doc_type,
            title: String::new(),
            author: String::new(),
            department: String::new(),
            classification: String::new(),
            summary: String::new(),
            key_sections: vec![],
            suggested_template: suggested.into(),
            confidence_score: confidence,
            fields: BTreeMap::new(),
            source: AnalysisSource::Rules,
        }
    }

    #[test]
    fn builtin_registry_is_complete() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.ids(), BUILTIN_TEMPLATE_IDS.to_vec());
        // Every type default resolves against the registry.
        for t in DocumentType::ALL {
            assert!(
                registry.get(default_template_for(t)).is_some(),
                "default for {t} not registered"
            );
        }
    }

    #[test]
    fn every_skeleton_has_its_slots() {
        for spec in TemplateRegistry::builtin().iter() {
            for slot in &spec.slots {
                assert!(
                    spec.skeleton.contains(&format!("[[{}]]", slot.name)),
                    "template {} skeleton missing slot {}",
                    spec.id,
                    slot.name
                );
            }
        }
    }

    #[test]
    fn user_override_beats_everything() {
        let registry = TemplateRegistry::builtin();
        let a = analysis(DocumentType::OfficeMemorandum, "academic_paper", 0.99);
        let spec = select(&registry, &a, Some("basic"), 0.5).unwrap();
        assert_eq!(spec.id, "basic");
    }

    #[test]
    fn confident_suggestion_beats_type_default() {
        let registry = TemplateRegistry::builtin();
        let a = analysis(DocumentType::OfficeMemorandum, "corporate_report", 0.8);
        let spec = select(&registry, &a, None, 0.5).unwrap();
        assert_eq!(spec.id, "corporate_report");
    }

    #[test]
    fn low_confidence_falls_back_to_type_default() {
        let registry = TemplateRegistry::builtin();
        let a = analysis(DocumentType::OfficeMemorandum, "corporate_report", 0.4);
        let spec = select(&registry, &a, None, 0.5).unwrap();
        assert_eq!(spec.id, "government_memo");
    }

    #[test]
    fn unknown_override_is_a_config_error() {
        let registry = TemplateRegistry::builtin();
        let a = analysis(DocumentType::Unknown, "", 0.1);
        let err = select(&registry, &a, Some("glossy_brochure"), 0.5).unwrap_err();
        assert!(matches!(err, Doc2TexError::UnknownTemplate { .. }), "got {err:?}");
    }

    #[test]
    fn empty_suggestion_never_wins() {
        let registry = TemplateRegistry::builtin();
        let a = analysis(DocumentType::Letter, "", 0.9);
        let spec = select(&registry, &a, None, 0.5).unwrap();
        assert_eq!(spec.id, "corporate_letter");
    }
}
