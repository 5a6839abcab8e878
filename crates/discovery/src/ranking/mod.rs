//! Rank boards over click windows

use novel_hub_core::{Board, CategoryId, CorpusStore, Novel, NovelFilter, Result};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Orders novels for one board: counter descending, newer upload, lower id
pub fn board_order(board: Board) -> impl Fn(&Novel, &Novel) -> Ordering {
    move |a, b| {
        b.clicks
            .for_board(board)
            .cmp(&a.clicks.for_board(board))
            .then_with(|| b.uploaded_at.cmp(&a.uploaded_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Produces ordered novel lists for the four boards
pub struct RankingEngine {
    corpus: Arc<dyn CorpusStore>,
}

impl RankingEngine {
    pub fn new(corpus: Arc<dyn CorpusStore>) -> Self {
        Self { corpus }
    }

    /// First `limit` approved novels of a board, optionally within one category.
    ///
    /// All counters come from one snapshot read, so a board never mixes values
    /// from before and after a rollover.
    #[instrument(skip(self))]
    pub async fn top(
        &self,
        board: Board,
        limit: usize,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Novel>> {
        let filter = category_id.map(NovelFilter::in_category).unwrap_or_default();
        let mut novels: Vec<Novel> = self
            .corpus
            .approved_novels(&filter)
            .await?
            .into_iter()
            .filter(Novel::is_approved)
            .collect();

        novels.sort_by(board_order(board));
        novels.truncate(limit);

        debug!(board = %board, returned = novels.len(), "Ranking computed");
        Ok(novels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use novel_hub_core::ClickCounters;

    fn novel(id: i64, week: i64, day: u32) -> Novel {
        Novel::new(id, format!("n{}", id), "a", Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap())
            .approved()
            .with_clicks(ClickCounters::new(week, 0, week, week))
    }

    #[test]
    fn test_board_order_tie_breaks() {
        let mut novels = vec![novel(1, 50, 2), novel(2, 50, 3), novel(3, 10, 5), novel(4, 50, 3)];
        novels.sort_by(board_order(Board::Week));
        let ids: Vec<_> = novels.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }
}
