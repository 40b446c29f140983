use super::*;
use crate::model::ClauseType;

const SAMPLE: &str = "제1편 총칙\n\n제1장 목적\n\n학교규정 1-1-1\n\n제1조 (목적) 이 규정의 목적을 정한다.\n① 세부사항은 따로 정한다.";

fn classifier() -> LineClassifier {
    LineClassifier::new().expect("classifier builds")
}

#[test]
fn normalize_line_collapses_whitespace() {
    assert_eq!(normalize_line("  제1편   총칙  "), "제1편 총칙");
    assert_eq!(normalize_line("\t"), "");
}

#[test]
fn classify_edition_and_chapter_headings() {
    let classifier = classifier();

    assert_eq!(
        classifier.classify("제1편 총칙"),
        LineToken::Edition {
            number: 1,
            title: "총칙".to_string()
        }
    );
    assert_eq!(
        classifier.classify("제 2 장 학사 운영"),
        LineToken::Chapter {
            number: 2,
            title: "학사 운영".to_string()
        }
    );
}

#[test]
fn classify_regulation_heading_forms() {
    let classifier = classifier();

    assert_eq!(
        classifier.classify("학교규정 1-1-1"),
        LineToken::Regulation {
            code: "1-1-1".to_string(),
            title: String::new()
        }
    );
    assert_eq!(
        classifier.classify("1-2-3 학칙"),
        LineToken::Regulation {
            code: "1-2-3".to_string(),
            title: "학칙".to_string()
        }
    );
}

#[test]
fn date_like_strings_are_not_regulation_codes() {
    let classifier = classifier();

    assert_eq!(classifier.classify("2023-10-15 개정 시행"), LineToken::Content);
}

#[test]
fn classify_article_heading_with_title_and_body() {
    let classifier = classifier();

    assert_eq!(
        classifier.classify("제1조 (목적) 이 규정의 목적을 정한다."),
        LineToken::Article {
            number: 1,
            title: Some("목적".to_string()),
            body: "이 규정의 목적을 정한다.".to_string()
        }
    );
}

#[test]
fn classify_sub_article_encodes_unique_number() {
    let classifier = classifier();

    assert_eq!(
        classifier.classify("제3조의2 (위원회)"),
        LineToken::Article {
            number: 302,
            title: Some("위원회".to_string()),
            body: String::new()
        }
    );
}

#[test]
fn classify_clause_marker_forms() {
    let classifier = classifier();

    assert_eq!(
        classifier.classify("① 세부사항은 따로 정한다."),
        LineToken::Clause {
            number: 1,
            body: "세부사항은 따로 정한다.".to_string(),
            clause_type: ClauseType::Paragraph
        }
    );
    assert_eq!(
        classifier.classify("(2) 둘째 항"),
        LineToken::Clause {
            number: 2,
            body: "둘째 항".to_string(),
            clause_type: ClauseType::Paragraph
        }
    );
    assert_eq!(
        classifier.classify("1. 첫째 호"),
        LineToken::Clause {
            number: 1,
            body: "첫째 호".to_string(),
            clause_type: ClauseType::Item
        }
    );
    assert_eq!(
        classifier.classify("다. 셋째 목"),
        LineToken::Clause {
            number: 3,
            body: "셋째 목".to_string(),
            clause_type: ClauseType::Item
        }
    );
}

#[test]
fn circled_glyphs_map_to_ordinals_one_through_ten() {
    let classifier = classifier();

    let LineToken::Clause { number, .. } = classifier.classify("⑩ 열째 항") else {
        panic!("expected a clause token");
    };
    assert_eq!(number, 10);
}

#[test]
fn proviso_clause_is_subparagraph() {
    let classifier = classifier();

    let LineToken::Clause { clause_type, .. } =
        classifier.classify("② 다만, 예외가 있는 경우에는 그러하지 아니하다.")
    else {
        panic!("expected a clause token");
    };
    assert_eq!(clause_type, ClauseType::Subparagraph);
}

#[test]
fn noise_rules_drop_page_decorations() {
    let classifier = classifier();

    for line in [
        "- 12 -",
        "128",
        "12/34",
        "2024. 3. 1.",
        "개정 2021. 9. 1.",
        "한국대학교 규정집",
        "========",
        "조항 내용 비고",
    ] {
        assert_eq!(classifier.classify(line), LineToken::Noise, "line: {line}");
    }
}

#[test]
fn appendix_and_attachment_markers_are_recognized() {
    let classifier = classifier();

    assert_eq!(classifier.classify("부칙"), LineToken::Appendix);
    assert_eq!(classifier.classify("별표 1"), LineToken::Attachment);
}

#[test]
fn plain_prose_is_content_not_noise() {
    let classifier = classifier();

    assert_eq!(
        classifier.classify("이 규정은 총장이 따로 정한다."),
        LineToken::Content
    );
}

#[test]
fn parse_sample_document_builds_full_hierarchy() {
    let outcome = DocumentBuilder::parse(SAMPLE).expect("parse succeeds");
    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);

    let document = outcome.arena.to_document();
    assert_eq!(document.editions.len(), 1);

    let edition = &document.editions[0];
    assert_eq!(edition.number, 1);
    assert_eq!(edition.title, "총칙");
    assert_eq!(edition.chapters.len(), 1);

    let chapter = &edition.chapters[0];
    assert_eq!(chapter.number, 1);
    assert_eq!(chapter.title, "목적");
    assert_eq!(chapter.regulations.len(), 1);

    let regulation = &chapter.regulations[0];
    assert_eq!(regulation.code, "1-1-1");
    assert_eq!(regulation.articles.len(), 1);

    let article = &regulation.articles[0];
    assert_eq!(article.number, 1);
    assert_eq!(article.title.as_deref(), Some("목적"));
    assert_eq!(article.content, "이 규정의 목적을 정한다.");
    assert_eq!(article.clauses.len(), 1);

    let clause = &article.clauses[0];
    assert_eq!(clause.number, 1);
    assert_eq!(clause.content, "세부사항은 따로 정한다.");
    assert_eq!(clause.clause_type, ClauseType::Paragraph);

    assert_eq!(outcome.statistics.total_lines, 8);
    assert_eq!(outcome.statistics.skipped_lines, 3);
    assert_eq!(outcome.statistics.editions, 1);
    assert_eq!(outcome.statistics.chapters, 1);
    assert_eq!(outcome.statistics.regulations, 1);
    assert_eq!(outcome.statistics.articles, 1);
    assert_eq!(outcome.statistics.clauses, 1);
    assert_eq!(outcome.statistics.error_lines, 0);
}

#[test]
fn chapter_before_edition_synthesizes_uncategorized_parent() {
    let text = "제1장 고립된 장\n학교규정 0-1-1 고립 규정";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].line_number, 1);
    assert_eq!(outcome.errors[0].state, "initial");

    assert_eq!(outcome.arena.editions.len(), 1);
    let edition = &outcome.arena.editions[0];
    assert_eq!(edition.number, 0);
    assert_eq!(edition.title, "Uncategorized");
    assert!(edition.synthetic);
    assert_eq!(edition.chapters.len(), 1);

    // the regulation still lands under the recovered chapter
    assert_eq!(outcome.arena.regulations.len(), 1);
    assert_eq!(outcome.arena.regulations[0].code, "0-1-1");
}

#[test]
fn content_attaches_to_deepest_open_node() {
    let text = "제1편 총칙\n제1장 목적\n1-1-1 학칙\n규정 전문 내용\n제1조 (목적) 본문\n조문 보충 내용\n① 첫 항\n항 보충 내용";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.arena.regulations[0].content, "규정 전문 내용");
    assert_eq!(outcome.arena.articles[0].content, "본문\n조문 보충 내용");
    assert_eq!(outcome.arena.clauses[0].content, "첫 항\n항 보충 내용");
    assert_eq!(outcome.content_lines, 3);
}

#[test]
fn higher_heading_discards_dangling_article_context() {
    let text = "제1편 총칙\n제1장 목적\n1-1-1 학칙\n제1조 (목적) 본문\n제2장 운영\n1-2-1 운영세칙";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.arena.chapters.len(), 2);
    assert_eq!(outcome.arena.regulations.len(), 2);

    let second_chapter = &outcome.arena.chapters[1];
    assert_eq!(second_chapter.number, 2);
    assert_eq!(second_chapter.regulations.len(), 1);
    assert_eq!(
        outcome.arena.regulations[second_chapter.regulations[0]].code,
        "1-2-1"
    );
}

#[test]
fn appendix_block_is_skipped_until_next_heading() {
    let text = "제1편 총칙\n제1장 목적\n1-1-1 학칙\n부칙\n이 규정은 공포한 날부터 시행한다.\n1-1-2 다른 규정";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.arena.regulations.len(), 2);
    assert_eq!(outcome.arena.regulations[1].code, "1-1-2");
    assert!(outcome.arena.regulations[1].content.is_empty());
    assert_eq!(outcome.statistics.skipped_lines, 2);
}

#[test]
fn clause_without_article_attaches_to_placeholder() {
    let text = "제1편 총칙\n제1장 목적\n1-1-1 학칙\n① 고아 항";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.arena.articles.len(), 1);
    assert_eq!(outcome.arena.articles[0].number, 0);
    assert_eq!(outcome.arena.clauses.len(), 1);
    assert_eq!(outcome.arena.clauses[0].content, "고아 항");
}

#[test]
fn code_disagreeing_with_ancestors_is_flagged_post_pass() {
    let text = "제1편 총칙\n제1장 목적\n9-9-1 엉뚱한 규정";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].state, "validation");
    assert!(outcome.errors[0].message.starts_with("validation_error"));

    // validation is advisory; the tree still carries the node
    assert_eq!(outcome.arena.regulations.len(), 1);
}

#[test]
fn non_noise_lines_are_either_content_or_headings() {
    let text = "한국대학교 규정집\n제1편 총칙\n- 3 -\n제1장 목적\n1-1-1 학칙\n규정 본문입니다\n제1조 (목적) 본문\n① 첫 항\n2024. 3. 1.\n항에 이어지는 내용";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert_eq!(
        outcome.heading_lines + outcome.content_lines,
        outcome.statistics.total_lines - outcome.statistics.skipped_lines
    );
    assert_eq!(outcome.statistics.skipped_lines, 3);
}

#[test]
fn empty_heading_titles_fall_back_to_marker_text() {
    let text = "제1편\n제1장\n1-1-1";
    let outcome = DocumentBuilder::parse(text).expect("parse succeeds");

    assert_eq!(outcome.arena.editions[0].title, "제1편");
    assert_eq!(outcome.arena.chapters[0].title, "제1장");
    assert_eq!(outcome.arena.regulations[0].title, "규정 1-1-1");
}

#[test]
fn parse_output_carries_metadata_and_nested_document() {
    let outcome = DocumentBuilder::parse(SAMPLE).expect("parse succeeds");
    let output = outcome.into_output();

    assert_eq!(output.metadata.parser_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(output.metadata.total_errors, 0);
    assert_eq!(output.metadata.success_rate_percent, 100.0);
    assert_eq!(output.data.editions.len(), 1);

    let json = serde_json::to_value(&output).expect("output serializes");
    assert_eq!(json["statistics"]["totalLines"], 8);
    assert_eq!(
        json["data"]["editions"][0]["chapters"][0]["regulations"][0]["articles"][0]["clauses"][0]
            ["type"],
        "paragraph"
    );
}

#[test]
fn independent_builders_parse_concurrently() {
    let handles: Vec<_> = (1..=4)
        .map(|index| {
            std::thread::spawn(move || {
                let text = format!(
                    "제{index}편 편제목\n제1장 장제목\n{index}-1-1 규정제목\n제1조 (목적) 내용"
                );
                DocumentBuilder::parse(&text).expect("parse succeeds")
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.join().expect("parser thread joins");
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.statistics.editions, 1);
        assert_eq!(outcome.statistics.regulations, 1);
        assert_eq!(outcome.statistics.articles, 1);
    }
}
