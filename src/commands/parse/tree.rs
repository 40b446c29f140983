use crate::model::{
    ClauseType, ParsedArticle, ParsedChapter, ParsedClause, ParsedDocumentData, ParsedEdition,
    ParsedRegulation,
};

/// Flat per-level storage with parent references by index. Nodes are
/// append-only; children lists preserve document order, which is also the
/// `sort_order` assignment order.
#[derive(Debug, Default)]
pub struct DocumentArena {
    pub editions: Vec<EditionNode>,
    pub chapters: Vec<ChapterNode>,
    pub regulations: Vec<RegulationNode>,
    pub articles: Vec<ArticleNode>,
    pub clauses: Vec<ClauseNode>,
}

#[derive(Debug)]
pub struct EditionNode {
    pub number: i64,
    pub title: String,
    pub sort_order: i64,
    pub synthetic: bool,
    pub chapters: Vec<usize>,
}

#[derive(Debug)]
pub struct ChapterNode {
    pub edition: usize,
    pub number: i64,
    pub title: String,
    pub sort_order: i64,
    pub synthetic: bool,
    pub regulations: Vec<usize>,
}

#[derive(Debug)]
pub struct RegulationNode {
    pub chapter: usize,
    pub code: String,
    pub title: String,
    pub content: String,
    pub sort_order: i64,
    pub line_number: usize,
    pub articles: Vec<usize>,
}

#[derive(Debug)]
pub struct ArticleNode {
    pub regulation: usize,
    pub number: i64,
    pub title: Option<String>,
    pub content: String,
    pub sort_order: i64,
    pub clauses: Vec<usize>,
}

#[derive(Debug)]
pub struct ClauseNode {
    pub article: usize,
    pub number: i64,
    pub content: String,
    pub clause_type: ClauseType,
    pub sort_order: i64,
}

impl DocumentArena {
    pub fn push_edition(&mut self, number: i64, title: String, synthetic: bool) -> usize {
        let sort_order = (self.editions.len() + 1) as i64;
        self.editions.push(EditionNode {
            number,
            title,
            sort_order,
            synthetic,
            chapters: Vec::new(),
        });
        self.editions.len() - 1
    }

    pub fn push_chapter(
        &mut self,
        edition: usize,
        number: i64,
        title: String,
        synthetic: bool,
    ) -> usize {
        let sort_order = (self.editions[edition].chapters.len() + 1) as i64;
        self.chapters.push(ChapterNode {
            edition,
            number,
            title,
            sort_order,
            synthetic,
            regulations: Vec::new(),
        });
        let index = self.chapters.len() - 1;
        self.editions[edition].chapters.push(index);
        index
    }

    pub fn push_regulation(
        &mut self,
        chapter: usize,
        code: String,
        title: String,
        line_number: usize,
    ) -> usize {
        let sort_order = (self.chapters[chapter].regulations.len() + 1) as i64;
        self.regulations.push(RegulationNode {
            chapter,
            code,
            title,
            content: String::new(),
            sort_order,
            line_number,
            articles: Vec::new(),
        });
        let index = self.regulations.len() - 1;
        self.chapters[chapter].regulations.push(index);
        index
    }

    pub fn push_article(
        &mut self,
        regulation: usize,
        number: i64,
        title: Option<String>,
        content: String,
    ) -> usize {
        let sort_order = (self.regulations[regulation].articles.len() + 1) as i64;
        self.articles.push(ArticleNode {
            regulation,
            number,
            title,
            content,
            sort_order,
            clauses: Vec::new(),
        });
        let index = self.articles.len() - 1;
        self.regulations[regulation].articles.push(index);
        index
    }

    pub fn push_clause(
        &mut self,
        article: usize,
        number: i64,
        content: String,
        clause_type: ClauseType,
    ) -> usize {
        let sort_order = (self.articles[article].clauses.len() + 1) as i64;
        self.clauses.push(ClauseNode {
            article,
            number,
            content,
            clause_type,
            sort_order,
        });
        let index = self.clauses.len() - 1;
        self.articles[article].clauses.push(index);
        index
    }

    /// Finds an existing synthetic chapter under `edition`, so orphans keep
    /// landing in the same uncategorized bucket.
    pub fn synthetic_chapter_of(&self, edition: usize) -> Option<usize> {
        self.editions[edition]
            .chapters
            .iter()
            .copied()
            .find(|&chapter| self.chapters[chapter].synthetic)
    }

    pub fn append_content(content: &mut String, line: &str) {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(line);
    }

    /// Nested serializable view in document order.
    pub fn to_document(&self) -> ParsedDocumentData {
        let editions = self
            .editions
            .iter()
            .map(|edition| ParsedEdition {
                number: edition.number,
                title: edition.title.clone(),
                chapters: edition
                    .chapters
                    .iter()
                    .map(|&chapter_index| {
                        let chapter = &self.chapters[chapter_index];
                        ParsedChapter {
                            number: chapter.number,
                            title: chapter.title.clone(),
                            regulations: chapter
                                .regulations
                                .iter()
                                .map(|&regulation_index| {
                                    self.regulation_to_parsed(regulation_index)
                                })
                                .collect(),
                        }
                    })
                    .collect(),
            })
            .collect();

        ParsedDocumentData { editions }
    }

    fn regulation_to_parsed(&self, regulation_index: usize) -> ParsedRegulation {
        let regulation = &self.regulations[regulation_index];
        ParsedRegulation {
            code: regulation.code.clone(),
            title: regulation.title.clone(),
            content: regulation.content.clone(),
            articles: regulation
                .articles
                .iter()
                .map(|&article_index| {
                    let article = &self.articles[article_index];
                    ParsedArticle {
                        number: article.number,
                        title: article.title.clone(),
                        content: article.content.clone(),
                        clauses: article
                            .clauses
                            .iter()
                            .map(|&clause_index| {
                                let clause = &self.clauses[clause_index];
                                ParsedClause {
                                    number: clause.number,
                                    content: clause.content.clone(),
                                    clause_type: clause.clause_type,
                                }
                            })
                            .collect(),
                    }
                })
                .collect(),
        }
    }
}
