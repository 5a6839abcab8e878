use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use novel_hub_core::{Novel, NovelId};
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, QueryParser};
use tantivy::schema::{
    Field, IndexRecordOption, OwnedValue, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED,
    STORED,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::{debug, warn};

use super::tokenizer::{cjk_analyzer, is_cjk_token, CJK_TOKENIZER};
use super::{order_hits, IndexError, ScoredHit, Suggestion, SuggestionType};

/// Text indexed with positions through the CJK analyzer
fn text_options() -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(CJK_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    )
}

/// Which projection of a novel an index holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// title, author, protagonist, description, keywords
    Metadata,
    /// full novel text
    Content,
}

impl IndexKind {
    fn schema(&self) -> Schema {
        let mut builder = Schema::builder();
        builder.add_i64_field("novel_id", INDEXED | STORED | FAST);
        match self {
            IndexKind::Metadata => {
                for name in self.text_field_names() {
                    builder.add_text_field(name, text_options().set_stored());
                }
            }
            IndexKind::Content => {
                builder.add_text_field("body", text_options());
            }
        }
        builder.build()
    }

    fn text_field_names(&self) -> &'static [&'static str] {
        match self {
            IndexKind::Metadata => &["title", "author", "protagonist", "description", "keywords"],
            IndexKind::Content => &["body"],
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Metadata => "metadata",
            IndexKind::Content => "content",
        }
    }
}

/// One on-disk Tantivy index keyed by novel id
///
/// Writes go through a single writer behind a mutex; each write commits and
/// reloads the reader before returning so the next query sees it.
pub struct NovelIndex {
    kind: IndexKind,
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    novel_id: Field,
    text_fields: Vec<Field>,
    /// Fields a suggestion may be drawn from, in priority order
    suggest_fields: Vec<(Field, SuggestionType)>,
}

impl NovelIndex {
    /// Open the index under `dir`, creating it if missing
    pub fn open(dir: &Path, kind: IndexKind, writer_memory: usize) -> Result<Self, IndexError> {
        std::fs::create_dir_all(dir)?;
        let directory = MmapDirectory::open(dir)?;
        let index = Index::open_or_create(directory, kind.schema())?;
        index.tokenizers().register(CJK_TOKENIZER, cjk_analyzer());
        let schema = index.schema();

        let novel_id = schema.get_field("novel_id")?;
        let text_fields = kind
            .text_field_names()
            .iter()
            .map(|name| schema.get_field(name))
            .collect::<Result<Vec<_>, _>>()?;

        let suggest_fields = match kind {
            IndexKind::Metadata => vec![
                (schema.get_field("title")?, SuggestionType::Title),
                (schema.get_field("author")?, SuggestionType::Author),
                (schema.get_field("protagonist")?, SuggestionType::Protagonist),
            ],
            IndexKind::Content => Vec::new(),
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer_with_num_threads(1, writer_memory)?;

        debug!(
            kind = kind.as_str(),
            path = %dir.display(),
            docs = reader.searcher().num_docs(),
            "Opened search index"
        );

        Ok(Self {
            kind,
            index,
            reader,
            writer: Mutex::new(writer),
            novel_id,
            text_fields,
            suggest_fields,
        })
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Metadata document of a novel
    pub fn metadata_document(&self, novel: &Novel) -> Result<TantivyDocument, IndexError> {
        if self.kind != IndexKind::Metadata {
            return Err(IndexError::WrongKind(self.kind.as_str()));
        }
        let schema = self.index.schema();
        let mut doc = TantivyDocument::default();
        doc.add_i64(self.novel_id, novel.id);
        doc.add_text(schema.get_field("title")?, &novel.title);
        doc.add_text(schema.get_field("author")?, &novel.author);
        doc.add_text(schema.get_field("protagonist")?, &novel.protagonist);
        doc.add_text(schema.get_field("description")?, &novel.description);
        doc.add_text(schema.get_field("keywords")?, novel.keyword_blob());
        Ok(doc)
    }

    /// Content document of a novel
    pub fn content_document(&self, novel_id: NovelId, text: &str) -> Result<TantivyDocument, IndexError> {
        if self.kind != IndexKind::Content {
            return Err(IndexError::WrongKind(self.kind.as_str()));
        }
        let mut doc = TantivyDocument::default();
        doc.add_i64(self.novel_id, novel_id);
        doc.add_text(self.index.schema().get_field("body")?, text);
        Ok(doc)
    }

    /// Replaces the document of `novel_id`; `None` only deletes.
    ///
    /// On failure the pending operations are rolled back, leaving the previously
    /// committed document in place.
    pub fn replace(&self, novel_id: NovelId, doc: Option<TantivyDocument>) -> Result<(), IndexError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        writer.delete_term(Term::from_field_i64(self.novel_id, novel_id));
        let staged = match doc {
            Some(doc) => writer.add_document(doc).map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = staged.and_then(|_| writer.commit().map(|_| ())) {
            if let Err(rollback) = writer.rollback() {
                warn!(kind = self.kind.as_str(), error = %rollback, "Index rollback failed");
            }
            return Err(e.into());
        }
        drop(writer);

        self.reader.reload()?;
        Ok(())
    }

    /// Every document matching `query` on any text field, best score first
    pub fn search_all(&self, query: &str) -> Result<Vec<ScoredHit>, IndexError> {
        let searcher = self.reader.searcher();
        let num_docs = searcher.num_docs() as usize;
        if num_docs == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, self.text_fields.clone());
        let (parsed, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            debug!(kind = self.kind.as_str(), query, errors = errors.len(), "Query parsed leniently");
        }

        let (top_docs, total) = searcher.search(&parsed, &(TopDocs::with_limit(num_docs), Count))?;
        debug!(kind = self.kind.as_str(), total, "Index query matched");

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let Some(novel_id) = stored_i64(&doc, self.novel_id) else {
                continue;
            };
            hits.push(ScoredHit { novel_id, score });
        }
        order_hits(&mut hits);
        Ok(hits)
    }

    /// Documents whose title, author or protagonist carry every `prefix` token
    /// within edit distance 1, falling back to prefix matching.
    ///
    /// Single ideographs are matched exactly: one edit away from any other
    /// ideograph, they would otherwise match every Chinese title.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<Suggestion>, IndexError> {
        let searcher = self.reader.searcher();
        if limit == 0 || self.suggest_fields.is_empty() || searcher.num_docs() == 0 {
            return Ok(Vec::new());
        }

        let tokens = self.tokenize(prefix)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let fuzzy = self.collect_suggestions(&searcher, &tokens, limit, false)?;
        if !fuzzy.is_empty() {
            return Ok(fuzzy);
        }
        self.collect_suggestions(&searcher, &tokens, limit, true)
    }

    fn tokenize(&self, text: &str) -> Result<Vec<String>, IndexError> {
        let (field, _) = self.suggest_fields[0];
        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        Ok(tokens)
    }

    fn collect_suggestions(
        &self,
        searcher: &Searcher,
        tokens: &[String],
        limit: usize,
        prefix_mode: bool,
    ) -> Result<Vec<Suggestion>, IndexError> {
        let mut per_token: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let distance = if is_cjk_token(token) { 0 } else { 1 };
            let any_field: Vec<(Occur, Box<dyn Query>)> = self
                .suggest_fields
                .iter()
                .map(|(field, _)| {
                    let term = Term::from_field_text(*field, token);
                    let query: Box<dyn Query> = if prefix_mode {
                        Box::new(FuzzyTermQuery::new_prefix(term, 0, true))
                    } else {
                        Box::new(FuzzyTermQuery::new(term, distance, true))
                    };
                    (Occur::Should, query)
                })
                .collect();
            per_token.push((Occur::Must, Box::new(BooleanQuery::new(any_field))));
        }
        let query = BooleanQuery::new(per_token);

        let fetch = limit.saturating_mul(4).max(20);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(fetch))?;

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let Some(novel_id) = stored_i64(&doc, self.novel_id) else {
                continue;
            };
            let (text, suggestion_type) = self
                .suggest_fields
                .iter()
                .find_map(|(field, kind)| {
                    stored_str(&doc, *field)
                        .filter(|s| !s.trim().is_empty())
                        .map(|s| (s.to_string(), kind.clone()))
                })
                .unwrap_or_else(|| (format!("novel_{}", novel_id), SuggestionType::Novel));

            if seen.insert(text.clone()) {
                suggestions.push(Suggestion {
                    text,
                    suggestion_type,
                    score,
                    novel_id: Some(novel_id),
                });
            }
            if suggestions.len() >= limit {
                break;
            }
        }
        Ok(suggestions)
    }
}

fn stored_i64(doc: &TantivyDocument, field: Field) -> Option<i64> {
    doc.get_first(field).and_then(|v| match v {
        OwnedValue::I64(i) => Some(*i),
        _ => None,
    })
}

fn stored_str(doc: &TantivyDocument, field: Field) -> Option<&str> {
    doc.get_first(field).and_then(|v| match v {
        OwnedValue::Str(s) => Some(s.as_str()),
        _ => None,
    })
}
