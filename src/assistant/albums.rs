//! Grouping of photo albums (Telegram media groups).
//!
//! Album photos arrive as separate messages sharing a media-group id, in
//! quick succession. Each photo is parked in the expiring list store; once
//! the group goes quiet for the debounce window, the collected photos are
//! handed to the completion callback as one batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::assistant::debounce::Debouncer;
use crate::assistant::store::ListStore;

/// Safety net in case a debouncer never fires (process restart mid-album).
const ALBUM_TTL: Duration = Duration::from_secs(60);

/// A photo queued inside a media group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumPhoto {
    pub file_id: String,
    pub caption: Option<String>,
}

pub type AlbumHandler = Arc<dyn Fn(Vec<AlbumPhoto>) + Send + Sync>;

pub struct AlbumCollector {
    store: Arc<ListStore>,
    debouncers: Arc<Mutex<HashMap<String, Debouncer>>>,
    window: Duration,
}

fn key(group_id: &str) -> String {
    format!("album:{group_id}")
}

impl AlbumCollector {
    pub fn new(store: Arc<ListStore>, window: Duration) -> Self {
        Self {
            store,
            debouncers: Arc::new(Mutex::new(HashMap::new())),
            window,
        }
    }

    /// Park a photo; `on_complete` fires once with the whole group (in
    /// arrival order) after the group has been quiet for the window.
    pub async fn add(&self, group_id: &str, photo: AlbumPhoto, on_complete: AlbumHandler) {
        let json = match serde_json::to_string(&photo) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize album photo: {e}");
                return;
            }
        };
        let list_key = key(group_id);
        self.store.push_front(&list_key, &json);
        self.store.expire(&list_key, ALBUM_TTL);

        let mut debouncers = self.debouncers.lock().await;
        let debouncer = debouncers.entry(group_id.to_string()).or_insert_with(|| {
            let store = self.store.clone();
            let map = self.debouncers.clone();
            let group_id = group_id.to_string();
            Debouncer::new(self.window, move || {
                let store = store.clone();
                let map = map.clone();
                let group_id = group_id.clone();
                let on_complete = on_complete.clone();
                tokio::spawn(async move {
                    map.lock().await.remove(&group_id);

                    let list_key = key(&group_id);
                    let photos: Vec<AlbumPhoto> = store
                        .range(&list_key)
                        .iter()
                        .rev() // stored newest-first
                        .filter_map(|json| serde_json::from_str(json).ok())
                        .collect();
                    store.delete(&list_key);

                    if !photos.is_empty() {
                        on_complete(photos);
                    }
                });
            })
        });
        debouncer.trigger().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::time::sleep;

    fn collector() -> AlbumCollector {
        AlbumCollector::new(Arc::new(ListStore::new()), Duration::from_millis(30))
    }

    fn photo(id: &str) -> AlbumPhoto {
        AlbumPhoto { file_id: id.to_string(), caption: None }
    }

    #[tokio::test]
    async fn test_group_flushes_once_in_order() {
        let collector = collector();
        let batches: Arc<StdMutex<Vec<Vec<AlbumPhoto>>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = batches.clone();
        let handler: AlbumHandler = Arc::new(move |photos| {
            sink.lock().unwrap().push(photos);
        });

        for id in ["a", "b", "c"] {
            collector.add("g1", photo(id), handler.clone()).await;
        }
        sleep(Duration::from_millis(100)).await;

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let ids: Vec<&str> = batches[0].iter().map(|p| p.file_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_groups_are_independent() {
        let collector = collector();
        let batches: Arc<StdMutex<Vec<Vec<AlbumPhoto>>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = batches.clone();
        let handler: AlbumHandler = Arc::new(move |photos| {
            sink.lock().unwrap().push(photos);
        });

        collector.add("g1", photo("a"), handler.clone()).await;
        collector.add("g2", photo("b"), handler.clone()).await;
        sleep(Duration::from_millis(100)).await;

        assert_eq!(batches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_is_cleared_after_flush() {
        let store = Arc::new(ListStore::new());
        let collector = AlbumCollector::new(store.clone(), Duration::from_millis(30));
        let handler: AlbumHandler = Arc::new(|_| {});

        collector.add("g1", photo("a"), handler).await;
        sleep(Duration::from_millis(100)).await;

        assert_eq!(store.len(&key("g1")), 0);
    }

    #[tokio::test]
    async fn test_caption_carried_through() {
        let collector = collector();
        let captions: Arc<StdMutex<Vec<Option<String>>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = captions.clone();
        let handler: AlbumHandler = Arc::new(move |photos| {
            let mut captions = sink.lock().unwrap();
            captions.extend(photos.into_iter().map(|p| p.caption));
        });

        let with_caption = AlbumPhoto {
            file_id: "a".to_string(),
            caption: Some("look at these".to_string()),
        };
        collector.add("g1", with_caption, handler.clone()).await;
        collector.add("g1", photo("b"), handler).await;
        sleep(Duration::from_millis(100)).await;

        let captions = captions.lock().unwrap();
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].as_deref(), Some("look at these"));
        assert_eq!(captions[1], None);
    }
}
