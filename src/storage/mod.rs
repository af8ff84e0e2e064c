use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::content::Article;
use crate::error::{ContentError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub articles_in_memory: usize,
    pub total_articles: u64,
    pub files_written: u64,
    pub disk_usage: u64,
    pub last_article: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: Uuid,
    pub topic: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Article> for ArticleSummary {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            topic: article.topic.clone(),
            file_name: article.file_name.clone(),
            created_at: article.created_at,
        }
    }
}

#[derive(Default)]
struct Inner {
    articles: HashMap<Uuid, Article>,
    order: VecDeque<Uuid>,
    stats: StorageStats,
}

/// Keeps recent articles for download, optionally mirroring them to disk.
pub struct ArticleStore {
    inner: Mutex<Inner>,
    capacity: usize,
    output_dir: Option<PathBuf>,
}

impl ArticleStore {
    pub fn new(capacity: usize, output_dir: Option<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            output_dir,
        }
    }

    pub async fn insert(&self, article: Article) -> Result<()> {
        let bytes_written = match &self.output_dir {
            Some(dir) => Some(Self::write_article(dir, &article).await?),
            None => None,
        };

        let mut inner = self.inner.lock().await;
        let id = article.id;
        inner.stats.total_articles += 1;
        inner.stats.last_article = Some(article.created_at);
        if let Some(bytes) = bytes_written {
            inner.stats.files_written += 1;
            inner.stats.disk_usage += bytes;
        }

        if inner.articles.insert(id, article).is_none() {
            inner.order.push_back(id);
        }
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.articles.remove(&evicted);
                debug!("Evicted article {} from memory", evicted);
            }
        }
        inner.stats.articles_in_memory = inner.articles.len();

        info!("Stored article {}", id);
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Option<Article> {
        self.inner.lock().await.articles.get(&id).cloned()
    }

    pub async fn require(&self, id: Uuid) -> Result<Article> {
        self.get(id)
            .await
            .ok_or_else(|| ContentError::NotFound(format!("Article {} not found", id)).into())
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<ArticleSummary> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.articles.get(id))
            .map(ArticleSummary::from)
            .collect()
    }

    pub async fn stats(&self) -> StorageStats {
        self.inner.lock().await.stats.clone()
    }

    pub fn article_path(dir: &Path, article: &Article) -> PathBuf {
        dir.join(format!("{}_{}", article.id, article.file_name))
    }

    async fn write_article(dir: &Path, article: &Article) -> Result<u64> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ContentError::StorageError(format!("Failed to create directory: {}", e)))?;

        let path = Self::article_path(dir, article);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ContentError::StorageError(format!("Failed to create file: {}", e)))?;
        file.write_all(article.markdown.as_bytes())
            .await
            .map_err(|e| ContentError::StorageError(format!("Failed to write content: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| ContentError::StorageError(format!("Failed to flush file: {}", e)))?;

        debug!("Wrote article to {}", path.display());
        Ok(article.markdown.len() as u64)
    }
}
