use serde::Serialize;

use crate::catalog::models::Song;
use crate::error::{AppError, Result};

pub const DEFAULT_PER_PAGE: usize = 10;

/// Case-insensitive substring match. An absent or empty needle matches everything.
pub fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        Some(n) if !n.is_empty() => haystack.to_lowercase().contains(&n.to_lowercase()),
        _ => true,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SongFilter {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl SongFilter {
    pub fn matches(&self, song: &Song) -> bool {
        contains_ignore_case(&song.title, self.title.as_deref())
            && contains_ignore_case(&song.artist, self.artist.as_deref())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Page {
    pub fn new(page: usize, per_page: usize) -> Result<Self> {
        if page == 0 || per_page == 0 {
            return Err(AppError::InvalidInput("page and per_page must be at least 1".into()));
        }
        Ok(Self { page, per_page })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
}

impl<T> Paginated<T> {
    pub fn from_vec(all: Vec<T>, page: Page) -> Self {
        let total = all.len();
        let pages = total.div_ceil(page.per_page);
        let items = all
            .into_iter()
            .skip((page.page - 1) * page.per_page)
            .take(page.per_page)
            .collect();

        Self {
            items,
            total,
            pages,
            current_page: page.page,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
