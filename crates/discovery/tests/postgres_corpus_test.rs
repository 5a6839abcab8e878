//! PostgreSQL corpus store tests
//!
//! Run against a scratch database by setting `DATABASE_URL`; every test is
//! skipped when no database is reachable.

use chrono::Utc;
use novel_hub_core::{
    ClickCounterStore, ClickWindow, ConfigLoader, CorpusStore, DatabaseConfig, HistorySource,
    NovelFilter, NovelId, SearchActor, SearchHistoryStore,
};
use novel_hub_discovery::PgCorpus;

async fn connect() -> Option<PgCorpus> {
    let config = match DatabaseConfig::from_env() {
        Ok(config) => config,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL tests");
            return None;
        }
    };
    match PgCorpus::connect(&config).await {
        Ok(corpus) => {
            corpus.migrate().await.expect("migrations apply");
            Some(corpus)
        }
        Err(e) => {
            eprintln!("PostgreSQL not available, skipping: {}", e);
            None
        }
    }
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn insert_novel(corpus: &PgCorpus, title: &str, status: &str) -> NovelId {
    sqlx::query_scalar(
        "INSERT INTO novels (title, author, status, word_count, click_count) \
         VALUES ($1, 'tester', $2, 1000, 10) RETURNING id",
    )
    .bind(title)
    .bind(status)
    .fetch_one(corpus.pool())
    .await
    .expect("insert novel")
}

async fn delete_novel(corpus: &PgCorpus, id: NovelId) {
    sqlx::query("DELETE FROM novels WHERE id = $1")
        .bind(id)
        .execute(corpus.pool())
        .await
        .expect("delete novel");
}

#[tokio::test]
async fn test_increment_and_reset() {
    let Some(corpus) = connect().await else {
        return;
    };
    let id = insert_novel(&corpus, &unique("clicks"), "approved").await;

    let first = corpus.increment(id).await.unwrap();
    let second = corpus.increment(id).await.unwrap();
    assert_eq!(second.total, first.total + 1);
    assert_eq!(second.today, 2);
    assert!(second.is_consistent());

    corpus.reset(ClickWindow::Day).await.unwrap();
    let novel = corpus.novel(id).await.unwrap();
    assert_eq!(novel.clicks.today, 0);
    assert_eq!(novel.clicks.week, 2);
    assert_eq!(novel.clicks.total, 12);

    delete_novel(&corpus, id).await;
}

#[tokio::test]
async fn test_unapproved_novels_are_hidden() {
    let Some(corpus) = connect().await else {
        return;
    };
    let id = insert_novel(&corpus, &unique("pending"), "pending").await;

    assert!(corpus.approved_novel(id).await.unwrap_err().is_not_found());
    assert!(corpus.increment(id).await.unwrap_err().is_not_found());
    let approved = corpus.approved_novels(&NovelFilter::default()).await.unwrap();
    assert!(approved.iter().all(|n| n.id != id));

    delete_novel(&corpus, id).await;
}

#[tokio::test]
async fn test_category_filter_and_rating_aggregates() {
    let Some(corpus) = connect().await else {
        return;
    };
    let id = insert_novel(&corpus, &unique("rated"), "approved").await;
    let category_id: i64 =
        sqlx::query_scalar("INSERT INTO categories (name) VALUES ($1) RETURNING id")
            .bind(unique("cat"))
            .fetch_one(corpus.pool())
            .await
            .unwrap();
    sqlx::query("INSERT INTO novel_categories (novel_id, category_id) VALUES ($1, $2)")
        .bind(id)
        .bind(category_id)
        .execute(corpus.pool())
        .await
        .unwrap();
    for (user, score) in [(1_i64, 5_i16), (2, 3)] {
        sqlx::query("INSERT INTO ratings (user_id, novel_id, score) VALUES ($1, $2, $3)")
            .bind(user)
            .bind(id)
            .bind(score)
            .execute(corpus.pool())
            .await
            .unwrap();
    }

    let filtered = corpus
        .approved_novels(&NovelFilter::in_category(category_id))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, id);
    assert_eq!(filtered[0].rating_count, 2);
    assert!((filtered[0].average_rating - 4.0).abs() < 1e-9);

    let ratings = corpus.recent_ratings(1, 20).await.unwrap();
    assert!(ratings.iter().any(|r| r.novel_id == id && r.score == 5));

    delete_novel(&corpus, id).await;
    sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(corpus.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_search_history_round_trip() {
    let Some(corpus) = connect().await else {
        return;
    };
    let user_id = Utc::now().timestamp_micros();
    let actor = SearchActor::User(user_id);
    let keyword = unique("kw");

    corpus.record(&actor, &keyword, Utc::now()).await.unwrap();
    corpus.record(&actor, &keyword, Utc::now()).await.unwrap();

    let history = corpus.user_history(user_id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].keyword, keyword);
    assert_eq!(history[0].count, 2);

    assert_eq!(corpus.clear_user_history(user_id).await.unwrap(), 1);
    assert!(corpus.user_history(user_id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_stats_include_latest_keyword() {
    let Some(corpus) = connect().await else {
        return;
    };
    let actor = SearchActor::Anonymous(unique("addr"));
    let keyword = unique("stat");
    let later = Utc::now() + chrono::Duration::days(3650);

    corpus.record(&actor, &keyword, later).await.unwrap();
    let stats = corpus.search_stats(5).await.unwrap();

    assert!(stats.total_searches >= 1);
    assert!(stats.distinct_keywords >= 1);
    assert!(stats.top_keywords.len() <= 5);
    assert_eq!(stats.recent_searches[0].keyword, keyword);
    assert_eq!(stats.recent_searches[0].count, 1);
}

#[tokio::test]
async fn test_batch_load_skips_unapproved_and_missing() {
    let Some(corpus) = connect().await else {
        return;
    };
    let approved = insert_novel(&corpus, &unique("batch-approved"), "approved").await;
    let pending = insert_novel(&corpus, &unique("batch-pending"), "pending").await;

    let novels = corpus
        .approved_novels_by_id(&[approved, pending, -1])
        .await
        .unwrap();
    let ids: Vec<NovelId> = novels.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![approved]);
    assert!(corpus.approved_novels_by_id(&[]).await.unwrap().is_empty());

    delete_novel(&corpus, approved).await;
    delete_novel(&corpus, pending).await;
}
