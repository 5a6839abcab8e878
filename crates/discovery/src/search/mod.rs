//! Full-text search over approved novels
//!
//! Two independent Tantivy indexes live under the configured directory: one
//! for novel metadata and one for full content, both analyzed with the CJK
//! tokenizer. Writes are serialized per index and visible to the next query
//! once they return. Query-time failures are logged and surface as empty
//! results.
//!
//! The index only knows relevance. Click counts change on every read, so hits
//! are ordered by live popularity where they are resolved against the corpus.

use novel_hub_core::{DiscoveryError, Novel, NovelId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub mod autocomplete;
pub mod keyword;
pub mod tokenizer;

pub use autocomplete::merge_suggestions;
pub use keyword::{IndexKind, NovelIndex};
pub use tokenizer::{cjk_analyzer, CjkTokenizer, CJK_TOKENIZER};

/// Search index failures
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Index directory error: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} index cannot hold this document")]
    WrongKind(&'static str),

    #[error("Index task failed: {0}")]
    Task(String),
}

impl From<IndexError> for DiscoveryError {
    fn from(err: IndexError) -> Self {
        DiscoveryError::Internal(err.to_string())
    }
}

/// A matching document and its relevance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    pub novel_id: NovelId,
    pub score: f32,
}

/// Suggestion type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Title,
    Author,
    Protagonist,
    /// Synthesized from the novel id when no text field is set
    Novel,
    History,
    Hot,
}

/// A single autocomplete suggestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub novel_id: Option<NovelId>,
}

/// Orders hits by score, then lower id
pub fn order_hits(hits: &mut [ScoredHit]) {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.novel_id.cmp(&b.novel_id))
    });
}

pub fn hit_ids(hits: &[ScoredHit]) -> Vec<NovelId> {
    hits.iter().map(|h| h.novel_id).collect()
}

async fn run_blocking<T, F>(task: F) -> Result<T, IndexError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, IndexError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| IndexError::Task(e.to_string()))?
}

/// Metadata and content indexes of the corpus
pub struct SearchIndex {
    metadata: Arc<NovelIndex>,
    content: Arc<NovelIndex>,
}

impl SearchIndex {
    /// Open both indexes under `dir`, creating them if missing
    pub fn open(dir: impl AsRef<Path>, writer_memory: usize) -> Result<Self, IndexError> {
        let dir = dir.as_ref();
        let metadata = NovelIndex::open(&dir.join("metadata"), IndexKind::Metadata, writer_memory)?;
        let content = NovelIndex::open(&dir.join("content"), IndexKind::Content, writer_memory)?;
        info!(
            path = %dir.display(),
            metadata_docs = metadata.num_docs(),
            content_docs = content.num_docs(),
            "Search index ready"
        );
        Ok(Self {
            metadata: Arc::new(metadata),
            content: Arc::new(content),
        })
    }

    /// (metadata, content) document counts
    pub fn document_counts(&self) -> (u64, u64) {
        (self.metadata.num_docs(), self.content.num_docs())
    }

    /// (Re)indexes a novel's metadata, replacing any prior document
    #[instrument(skip(self, novel), fields(novel_id = novel.id))]
    pub async fn index_novel(&self, novel: &Novel) -> Result<(), IndexError> {
        let doc = self.metadata.metadata_document(novel)?;
        let index = Arc::clone(&self.metadata);
        let novel_id = novel.id;
        run_blocking(move || index.replace(novel_id, Some(doc))).await?;
        debug!("Metadata document indexed");
        Ok(())
    }

    /// (Re)indexes a novel's full text
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn index_content(&self, novel_id: NovelId, text: &str) -> Result<(), IndexError> {
        let doc = self.content.content_document(novel_id, text)?;
        let index = Arc::clone(&self.content);
        run_blocking(move || index.replace(novel_id, Some(doc))).await?;
        debug!("Content document indexed");
        Ok(())
    }

    /// Removes both documents of a novel
    #[instrument(skip(self))]
    pub async fn delete_novel(&self, novel_id: NovelId) -> Result<(), IndexError> {
        let metadata = Arc::clone(&self.metadata);
        let content = Arc::clone(&self.content);
        run_blocking(move || {
            let removed_metadata = metadata.replace(novel_id, None);
            let removed_content = content.replace(novel_id, None);
            removed_metadata.and(removed_content)
        })
        .await?;
        debug!("Novel removed from search index");
        Ok(())
    }

    /// Any-field match over title, author, protagonist, description and
    /// keywords, every hit best score first
    #[instrument(skip(self))]
    pub async fn search_metadata(&self, query: &str) -> Vec<ScoredHit> {
        let index = Arc::clone(&self.metadata);
        let query = query.to_string();
        let result = run_blocking(move || index.search_all(&query)).await;
        self.hits_or_empty("metadata", result)
    }

    /// Match against full novel text, every hit best score first
    #[instrument(skip(self))]
    pub async fn search_content(&self, query: &str) -> Vec<ScoredHit> {
        let index = Arc::clone(&self.content);
        let query = query.to_string();
        let result = run_blocking(move || index.search_all(&query)).await;
        self.hits_or_empty("content", result)
    }

    /// Up to `limit` title/author/protagonist suggestions for `prefix`
    #[instrument(skip(self))]
    pub async fn suggest(&self, prefix: &str, limit: usize) -> Vec<Suggestion> {
        let index = Arc::clone(&self.metadata);
        let prefix = prefix.to_string();
        match run_blocking(move || index.suggest(&prefix, limit)).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                error!(error = %e, "Suggestion lookup failed");
                Vec::new()
            }
        }
    }

    fn hits_or_empty(
        &self,
        kind: &'static str,
        result: Result<Vec<ScoredHit>, IndexError>,
    ) -> Vec<ScoredHit> {
        match result {
            Ok(hits) => {
                debug!(kind, total = hits.len(), "Search completed");
                hits
            }
            Err(e) => {
                error!(kind, error = %e, "Search failed, returning empty result");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(novel_id: NovelId, score: f32) -> ScoredHit {
        ScoredHit { novel_id, score }
    }

    #[test]
    fn test_order_hits_by_score_then_id() {
        let mut hits = vec![hit(3, 1.0), hit(1, 1.0), hit(2, 1.5), hit(4, 2.0)];
        order_hits(&mut hits);
        assert_eq!(hit_ids(&hits), vec![4, 2, 1, 3]);
    }
}
