//! PostgreSQL corpus store
//!
//! Snapshot reads are single `SELECT` statements, so one ranking read sees a
//! single committed state of every counter. A click is one
//! `UPDATE ... RETURNING` and advances the four counters together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use novel_hub_core::{
    Category, ClickCounterStore, ClickCounters, ClickWindow, Comment, CorpusStore,
    DatabaseConfig, DiscoveryError, HistorySource, HotKeyword, Keyword, KeywordActivity, Novel,
    NovelFilter, NovelId, NovelStatus, Rating, ReadingProgress, Result, SearchActor,
    SearchHistoryEntry, SearchHistoryStore, SearchStats, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use std::collections::HashSet;
use tracing::{debug, error, info, instrument};

const NOVEL_SELECT: &str = r#"
    SELECT
        n.id, n.title, n.author, n.protagonist, n.description, n.status,
        n.word_count, n.uploader_id, n.uploaded_at, n.content_locator,
        n.click_count, n.today_clicks, n.week_clicks, n.month_clicks,
        COALESCE(r.average_rating, 0)::float8 AS average_rating,
        COALESCE(r.rating_count, 0)::bigint AS rating_count,
        COALESCE(c.categories, '[]'::json) AS categories,
        COALESCE(k.keywords, '[]'::json) AS keywords
    FROM novels n
    LEFT JOIN LATERAL (
        SELECT AVG(score)::float8 AS average_rating, COUNT(*) AS rating_count
        FROM ratings WHERE novel_id = n.id
    ) r ON TRUE
    LEFT JOIN LATERAL (
        SELECT json_agg(json_build_object('id', cat.id, 'name', cat.name, 'parent_id', cat.parent_id)
                        ORDER BY cat.id) AS categories
        FROM novel_categories nc JOIN categories cat ON cat.id = nc.category_id
        WHERE nc.novel_id = n.id
    ) c ON TRUE
    LEFT JOIN LATERAL (
        SELECT json_agg(json_build_object('id', kw.id, 'word', kw.word, 'weight', kw.weight)
                        ORDER BY kw.id) AS keywords
        FROM novel_keywords nk JOIN keywords kw ON kw.id = nk.keyword_id
        WHERE nk.novel_id = n.id
    ) k ON TRUE
"#;

const RESET_DAY: &str = "UPDATE novels SET today_clicks = 0";
const RESET_WEEK: &str = "UPDATE novels SET week_clicks = 0";
const RESET_MONTH: &str = "UPDATE novels SET month_clicks = 0";

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn novel_from_row(row: &PgRow) -> Result<Novel> {
    let status: String = row.try_get("status")?;
    let categories: Json<Vec<Category>> = row.try_get("categories")?;
    let keywords: Json<Vec<Keyword>> = row.try_get("keywords")?;

    Ok(Novel::new(
        row.try_get("id")?,
        row.try_get::<String, _>("title")?,
        row.try_get::<String, _>("author")?,
        row.try_get("uploaded_at")?,
    )
    .with_status(status.parse::<NovelStatus>()?)
    .with_protagonist(row.try_get::<String, _>("protagonist")?)
    .with_description(row.try_get::<String, _>("description")?)
    .with_word_count(row.try_get("word_count")?)
    .with_uploader(row.try_get("uploader_id")?)
    .with_content_locator(row.try_get::<String, _>("content_locator")?)
    .with_clicks(ClickCounters::new(
        row.try_get("click_count")?,
        row.try_get("today_clicks")?,
        row.try_get("week_clicks")?,
        row.try_get("month_clicks")?,
    ))
    .with_rating(row.try_get("average_rating")?, row.try_get("rating_count")?)
    .with_categories(categories.0)
    .with_keywords(keywords.0))
}

async fn read_locator(novel_id: NovelId, locator: &str) -> Result<String> {
    match tokio::fs::read_to_string(locator).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(DiscoveryError::not_found("content", novel_id))
        }
        Err(e) => {
            error!(novel_id, locator, error = %e, "Failed to read novel content");
            Err(DiscoveryError::internal(format!(
                "content read failed for novel {}",
                novel_id
            )))
        }
    }
}

/// Corpus store over a PostgreSQL pool
#[derive(Clone)]
pub struct PgCorpus {
    pool: PgPool,
}

impl PgCorpus {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await?;
        info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL corpus"
        );
        Ok(Self::new(pool))
    }

    /// Applies the bundled schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DiscoveryError::internal(format!("migration failed: {}", e)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CorpusStore for PgCorpus {
    #[instrument(skip(self))]
    async fn novel(&self, id: NovelId) -> Result<Novel> {
        let sql = format!("{} WHERE n.id = $1", NOVEL_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DiscoveryError::not_found("novel", id))?;
        novel_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn approved_novels(&self, filter: &NovelFilter) -> Result<Vec<Novel>> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(NOVEL_SELECT);
        query.push(" WHERE n.status = 'approved'");

        if let Some(categories) = &filter.any_category {
            query.push(
                " AND EXISTS (SELECT 1 FROM novel_categories fc \
                 WHERE fc.novel_id = n.id AND fc.category_id = ANY(",
            );
            query.push_bind(categories.clone());
            query.push("))");
        }
        if let Some(words) = &filter.any_keyword {
            query.push(
                " AND EXISTS (SELECT 1 FROM novel_keywords fk \
                 JOIN keywords fw ON fw.id = fk.keyword_id \
                 WHERE fk.novel_id = n.id AND fw.word = ANY(",
            );
            query.push_bind(words.clone());
            query.push("))");
        }
        if let Some(since) = filter.uploaded_since {
            query.push(" AND n.uploaded_at >= ");
            query.push_bind(since);
        }
        query.push(" ORDER BY n.id");

        let rows = query.build().fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), "Loaded approved novel snapshot");
        rows.iter().map(novel_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    async fn approved_novels_by_id(&self, ids: &[NovelId]) -> Result<Vec<Novel>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE n.status = 'approved' AND n.id = ANY($1)",
            NOVEL_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(novel_from_row).collect()
    }

    async fn novel_content(&self, id: NovelId) -> Result<String> {
        let locator: String = sqlx::query_scalar("SELECT content_locator FROM novels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DiscoveryError::not_found("novel", id))?;

        if !locator.is_empty() {
            return read_locator(id, &locator).await;
        }

        let chapter_locators: Vec<String> = sqlx::query_scalar(
            "SELECT content_locator FROM chapters WHERE novel_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        if chapter_locators.is_empty() {
            return Err(DiscoveryError::not_found("content", id));
        }

        let mut parts = Vec::with_capacity(chapter_locators.len());
        for chapter in &chapter_locators {
            parts.push(read_locator(id, chapter).await?);
        }
        Ok(parts.join("\n"))
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, parent_id FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    parent_id: row.try_get("parent_id")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl HistorySource for PgCorpus {
    async fn recent_reading(&self, user_id: UserId, limit: usize) -> Result<Vec<ReadingProgress>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, novel_id, chapter_id, position, updated_at
            FROM reading_progress
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ReadingProgress {
                    user_id: row.try_get("user_id")?,
                    novel_id: row.try_get("novel_id")?,
                    chapter_id: row.try_get("chapter_id")?,
                    position: row.try_get("position")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    async fn recent_ratings(&self, user_id: UserId, limit: usize) -> Result<Vec<Rating>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, novel_id, score, review, created_at
            FROM ratings
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Rating {
                    user_id: row.try_get("user_id")?,
                    novel_id: row.try_get("novel_id")?,
                    score: row.try_get("score")?,
                    review: row.try_get("review")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn recent_comments(&self, user_id: UserId, limit: usize) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, novel_id, content, created_at
            FROM comments
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Comment {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    novel_id: row.try_get("novel_id")?,
                    content: row.try_get("content")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn read_novel_ids(&self, user_id: UserId) -> Result<HashSet<NovelId>> {
        let ids: Vec<NovelId> =
            sqlx::query_scalar("SELECT novel_id FROM reading_progress WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl ClickCounterStore for PgCorpus {
    #[instrument(skip(self))]
    async fn increment(&self, novel_id: NovelId) -> Result<ClickCounters> {
        let row = sqlx::query(
            r#"
            UPDATE novels
            SET click_count = click_count + 1,
                today_clicks = today_clicks + 1,
                week_clicks = week_clicks + 1,
                month_clicks = month_clicks + 1
            WHERE id = $1 AND status = 'approved'
            RETURNING click_count, today_clicks, week_clicks, month_clicks
            "#,
        )
        .bind(novel_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DiscoveryError::not_found("novel", novel_id))?;

        Ok(ClickCounters::new(
            row.try_get("click_count")?,
            row.try_get("today_clicks")?,
            row.try_get("week_clicks")?,
            row.try_get("month_clicks")?,
        ))
    }

    #[instrument(skip(self))]
    async fn reset(&self, window: ClickWindow) -> Result<u64> {
        let statement = match window {
            ClickWindow::Day => RESET_DAY,
            ClickWindow::Week => RESET_WEEK,
            ClickWindow::Month => RESET_MONTH,
        };
        let result = sqlx::query(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SearchHistoryStore for PgCorpus {
    async fn record(&self, actor: &SearchActor, keyword: &str, at: DateTime<Utc>) -> Result<()> {
        let client_addr = match actor {
            SearchActor::Anonymous(addr) => Some(addr.as_str()),
            SearchActor::User(_) => None,
        };
        sqlx::query(
            r#"
            INSERT INTO search_history (actor_key, user_id, client_addr, keyword, count, last_seen)
            VALUES ($1, $2, $3, $4, 1, $5)
            ON CONFLICT (actor_key, keyword) DO UPDATE
            SET count = search_history.count + 1,
                last_seen = GREATEST(search_history.last_seen, EXCLUDED.last_seen)
            "#,
        )
        .bind(actor.key())
        .bind(actor.user_id())
        .bind(client_addr)
        .bind(keyword)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn hot_keywords(&self, limit: usize) -> Result<Vec<HotKeyword>> {
        let rows = sqlx::query(
            r#"
            SELECT keyword, SUM(count)::bigint AS count, MAX(last_seen) AS last_seen
            FROM search_history
            GROUP BY keyword
            ORDER BY count DESC, last_seen DESC, keyword ASC
            LIMIT $1
            "#,
        )
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(HotKeyword {
                    keyword: row.try_get("keyword")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn user_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, client_addr, keyword, count, last_seen
            FROM search_history
            WHERE user_id = $1
            ORDER BY last_seen DESC, keyword ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SearchHistoryEntry {
                    user_id: row.try_get("user_id")?,
                    client_addr: row.try_get("client_addr")?,
                    keyword: row.try_get("keyword")?,
                    count: row.try_get("count")?,
                    last_seen: row.try_get("last_seen")?,
                })
            })
            .collect()
    }

    async fn clear_user_history(&self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM search_history WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn search_stats(&self, limit: usize) -> Result<SearchStats> {
        let totals = sqlx::query(
            r#"
            SELECT COALESCE(SUM(count), 0)::bigint AS total_searches,
                   COUNT(DISTINCT keyword) AS distinct_keywords
            FROM search_history
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT keyword, SUM(count)::bigint AS count, MAX(last_seen) AS last_seen
            FROM search_history
            GROUP BY keyword
            ORDER BY last_seen DESC, keyword ASC
            LIMIT $1
            "#,
        )
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        let recent_searches = rows
            .iter()
            .map(|row| {
                Ok(KeywordActivity {
                    keyword: row.try_get("keyword")?,
                    count: row.try_get("count")?,
                    last_seen: row.try_get("last_seen")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchStats {
            total_searches: totals.try_get("total_searches")?,
            distinct_keywords: totals.try_get("distinct_keywords")?,
            top_keywords: self.hot_keywords(limit).await?,
            recent_searches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_statements_touch_one_column() {
        assert!(RESET_DAY.contains("today_clicks"));
        assert!(RESET_WEEK.contains("week_clicks"));
        assert!(RESET_MONTH.contains("month_clicks"));
    }

    #[test]
    fn test_limit_param_saturates() {
        assert_eq!(limit_param(10), 10);
        assert_eq!(limit_param(usize::MAX), i64::MAX);
    }
}
