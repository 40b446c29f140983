use anyhow::{Context, Result};
use regex::Regex;

use crate::model::ClauseType;

const CIRCLED_DIGITS: [char; 10] = ['①', '②', '③', '④', '⑤', '⑥', '⑦', '⑧', '⑨', '⑩'];
const HANGUL_ORDINALS: [char; 14] = [
    '가', '나', '다', '라', '마', '바', '사', '아', '자', '차', '카', '타', '파', '하',
];

/// Longest remaining text still accepted as a heading title. Longer tails are
/// running prose that happens to start like a heading.
const MAX_HEADING_TITLE_CHARS: usize = 80;

/// Structural classification of one normalized line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineToken {
    Edition {
        number: i64,
        title: String,
    },
    Chapter {
        number: i64,
        title: String,
    },
    Regulation {
        code: String,
        title: String,
    },
    Article {
        number: i64,
        title: Option<String>,
        body: String,
    },
    Clause {
        number: i64,
        body: String,
        clause_type: ClauseType,
    },
    Appendix,
    Attachment,
    Noise,
    Content,
}

/// Replaceable noise rules: page decorations, running headers, date-only and
/// revision-history lines, table column headers, separator rules.
#[derive(Debug)]
pub struct NoiseRuleSet {
    rules: Vec<Regex>,
}

impl NoiseRuleSet {
    pub fn default_rules() -> Result<Self> {
        let patterns = [
            r"^[-–—]?\s*\d{1,4}\s*[-–—]?$",
            r"^\d{1,4}\s*/\s*\d{1,4}$",
            r"(?i)^(?:페이지|page)\s*\d+$",
            r"^\d{4}\s*[.\-/]\s*\d{1,2}\s*[.\-/]\s*\d{1,2}\s*\.?$",
            r"^(?:제정|개정|전부개정|일부개정|폐지)(?:\s*\d{4}\s*[.\-/]\s*\d{1,2}\s*[.\-/]\s*\d{1,2}\s*\.?)+$",
            r"^[─━═=\-_·•┄┈┉\s]{4,}$",
            r"^\S*대학교\s*규정집(?:\s*\d+)?$",
            r"^(?:조항|조문|구분|내용|비고|제목|순번|번호)(?:\s+(?:조항|조문|구분|내용|비고|제목|순번|번호))+$",
        ];

        let mut rules = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            rules.push(
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile noise rule: {pattern}"))?,
            );
        }

        Ok(Self { rules })
    }

    pub fn with_rules(rules: Vec<Regex>) -> Self {
        Self { rules }
    }

    pub fn is_noise(&self, line: &str) -> bool {
        self.rules.iter().any(|rule| rule.is_match(line))
    }
}

/// Collapses internal whitespace and trims. The classifier expects its input
/// to have gone through this.
pub fn normalize_line(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
pub struct LineClassifier {
    noise: NoiseRuleSet,
    edition_heading: Regex,
    chapter_heading: Regex,
    regulation_heading: Regex,
    article_heading: Regex,
    clause_paren: Regex,
    clause_digit_dot: Regex,
    clause_hangul_dot: Regex,
    appendix_marker: Regex,
    attachment_marker: Regex,
    enumerator_prefix: Regex,
}

impl LineClassifier {
    pub fn new() -> Result<Self> {
        Self::with_noise_rules(NoiseRuleSet::default_rules()?)
    }

    pub fn with_noise_rules(noise: NoiseRuleSet) -> Result<Self> {
        Ok(Self {
            noise,
            edition_heading: Regex::new(r"^제\s*(?P<number>\d+)\s*편\s*(?P<title>.*)$")
                .context("failed to compile edition heading regex")?,
            chapter_heading: Regex::new(r"^제\s*(?P<number>\d+)\s*장\s*(?P<title>.*)$")
                .context("failed to compile chapter heading regex")?,
            regulation_heading: Regex::new(
                r"^(?:학교\s*규정|규정)?\s*(?P<code>\d{1,2}-\d{1,2}-\d{1,3})\s*(?P<title>.*)$",
            )
            .context("failed to compile regulation heading regex")?,
            article_heading: Regex::new(
                r"^제\s*(?P<number>\d+)\s*조(?:의\s*(?P<sub>\d+))?\s*(?:\((?P<title>[^)]+)\))?\s*(?P<body>.*)$",
            )
            .context("failed to compile article heading regex")?,
            clause_paren: Regex::new(r"^\(?\s*(?P<number>\d{1,2})\s*\)\s*(?P<body>.*)$")
                .context("failed to compile parenthesized clause regex")?,
            clause_digit_dot: Regex::new(r"^(?P<number>\d{1,2})\.\s*(?P<body>.*)$")
                .context("failed to compile digit-dot clause regex")?,
            clause_hangul_dot: Regex::new(r"^(?P<letter>[가나다라마바사아자차카타파하])\.\s*(?P<body>.*)$")
                .context("failed to compile hangul-dot clause regex")?,
            appendix_marker: Regex::new(r"^부\s*칙")
                .context("failed to compile appendix marker regex")?,
            attachment_marker: Regex::new(r"^\[?\s*(?:별\s*표|별\s*지|서\s*식)")
                .context("failed to compile attachment marker regex")?,
            enumerator_prefix: Regex::new(r"^(?:\d{1,2}|[가나다라마바사아자차카타파하])[.)]")
                .context("failed to compile enumerator prefix regex")?,
        })
    }

    /// Pure classification of one normalized line. Highest hierarchy level
    /// wins; only explicit noise rules drop a line, everything else falls
    /// through to `Content`.
    pub fn classify(&self, line: &str) -> LineToken {
        if line.is_empty() || self.noise.is_noise(line) {
            return LineToken::Noise;
        }

        if let Some(captures) = self.edition_heading.captures(line) {
            if let Some(number) = capture_number(&captures, "number") {
                let title = captures["title"].trim().to_string();
                if heading_title_fits(&title) {
                    return LineToken::Edition { number, title };
                }
            }
        }

        if let Some(captures) = self.chapter_heading.captures(line) {
            if let Some(number) = capture_number(&captures, "number") {
                let title = captures["title"].trim().to_string();
                if heading_title_fits(&title) {
                    return LineToken::Chapter { number, title };
                }
            }
        }

        if let Some(captures) = self.regulation_heading.captures(line) {
            let code = captures["code"].to_string();
            let title = captures["title"].trim().to_string();
            if heading_title_fits(&title) {
                return LineToken::Regulation { code, title };
            }
        }

        if let Some(captures) = self.article_heading.captures(line) {
            if let Some(number) = capture_number(&captures, "number") {
                // 제N조의M keeps a unique number by encoding the sub-article.
                let number = match captures.name("sub").and_then(|m| m.as_str().parse::<i64>().ok())
                {
                    Some(sub) => number * 100 + sub,
                    None => number,
                };
                let title = captures
                    .name("title")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|value| !value.is_empty());
                let body = captures
                    .name("body")
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                return LineToken::Article {
                    number,
                    title,
                    body,
                };
            }
        }

        if let Some(token) = self.classify_clause(line) {
            return token;
        }

        if self.appendix_marker.is_match(line) {
            return LineToken::Appendix;
        }

        if self.attachment_marker.is_match(line) {
            return LineToken::Attachment;
        }

        LineToken::Content
    }

    fn classify_clause(&self, line: &str) -> Option<LineToken> {
        let first = line.chars().next()?;
        if let Some(index) = CIRCLED_DIGITS.iter().position(|glyph| *glyph == first) {
            let body = line[first.len_utf8()..].trim().to_string();
            return Some(LineToken::Clause {
                number: (index + 1) as i64,
                clause_type: self.clause_type_for(line),
                body,
            });
        }

        if let Some(captures) = self.clause_paren.captures(line) {
            let number = capture_number(&captures, "number")?;
            let body = captures["body"].trim().to_string();
            return Some(LineToken::Clause {
                number,
                clause_type: self.clause_type_for(line),
                body,
            });
        }

        if let Some(captures) = self.clause_digit_dot.captures(line) {
            let number = capture_number(&captures, "number")?;
            let body = captures["body"].trim().to_string();
            return Some(LineToken::Clause {
                number,
                clause_type: self.clause_type_for(line),
                body,
            });
        }

        if let Some(captures) = self.clause_hangul_dot.captures(line) {
            let letter = captures["letter"].chars().next()?;
            let number = HANGUL_ORDINALS
                .iter()
                .position(|ordinal| *ordinal == letter)
                .map(|index| (index + 1) as i64)?;
            let body = captures["body"].trim().to_string();
            return Some(LineToken::Clause {
                number,
                clause_type: self.clause_type_for(line),
                body,
            });
        }

        None
    }

    /// Proviso keyword wins, then a leading enumerator marker, else a plain
    /// paragraph. Runs against the full marker line.
    fn clause_type_for(&self, line: &str) -> ClauseType {
        if line.contains("다만") || line.contains("단,") {
            return ClauseType::Subparagraph;
        }

        if self.enumerator_prefix.is_match(line) {
            return ClauseType::Item;
        }

        ClauseType::Paragraph
    }
}

fn capture_number(captures: &regex::Captures<'_>, name: &str) -> Option<i64> {
    captures.name(name)?.as_str().parse::<i64>().ok()
}

fn heading_title_fits(title: &str) -> bool {
    title.chars().count() <= MAX_HEADING_TITLE_CHARS
}
