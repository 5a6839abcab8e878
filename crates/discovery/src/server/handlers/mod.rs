pub mod admin;
pub mod discovery;
pub mod search;

pub use admin::{cache_stats, index_novel, rebuild_index};
pub use discovery::{personalized, rankings, recommendations, record_click};
pub use search::{
    clear_history, history, hot_words, search_full_text, search_novels, search_stats, suggestions,
};
