// tests/ingest_partial_failure.rs
//
// One bad item never takes the rest of the batch down with it.

use std::sync::Arc;

use async_trait::async_trait;
use election_hub::error::FetchError;
use election_hub::ingest::types::{FeedBatch, NewsFeed, RawItem};
use election_hub::ingest::{IngestReport, NewsIngestor};
use election_hub::store::memory::MemoryStore;

struct FixedFeed(FeedBatch);

#[async_trait]
impl NewsFeed for FixedFeed {
    async fn fetch_latest(&self) -> Result<FeedBatch, FetchError> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn item(id: &str) -> RawItem {
    RawItem {
        id: Some(id.into()),
        title: Some(format!("headline {id}")),
        url: Some(format!("https://news.test/{id}")),
        published: Some(format!("2024-05-0{id} 09:00:00 +0000")),
        ..RawItem::default()
    }
}

#[tokio::test]
async fn invalid_third_item_is_skipped() {
    let mut broken = item("3");
    broken.published = Some("yesterday-ish".into());

    let feed = FixedFeed(vec![
        Ok(item("1")),
        Ok(item("2")),
        Ok(broken),
        Ok(item("4")),
        Ok(item("5")),
    ]);
    let store = Arc::new(MemoryStore::new());
    let ingestor = NewsIngestor::new(Arc::new(feed), store.clone());

    let report = ingestor.run_once().await.expect("run completes");
    assert_eq!(
        report,
        IngestReport {
            fetched: 5,
            inserted: 4,
            invalid: 1,
            ..IngestReport::default()
        }
    );

    for id in ["1", "2", "4", "5"] {
        assert!(store.get(id).is_some(), "item {id} should be stored");
    }
    assert!(store.get("3").is_none());
}

#[tokio::test]
async fn missing_id_is_skipped() {
    let mut no_id = item("2");
    no_id.id = Some("   ".into());

    let feed = FixedFeed(vec![Ok(item("1")), Ok(no_id), Ok(item("3"))]);
    let store = Arc::new(MemoryStore::new());
    let report = NewsIngestor::new(Arc::new(feed), store.clone())
        .run_once()
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.invalid, 1);
    assert_eq!(store.news_len(), 2);
}

#[tokio::test]
async fn store_fault_on_one_item_keeps_the_others() {
    let feed = FixedFeed((1..=5).map(|n| Ok(item(&n.to_string()))).collect());
    let store = Arc::new(MemoryStore::failing_on(["3"]));
    let ingestor = NewsIngestor::new(Arc::new(feed), store.clone());

    let report = ingestor.run_once().await.expect("item faults are not fatal");
    assert_eq!(report.inserted, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(store.news_len(), 4);
    assert!(store.get("3").is_none());
    assert!(store.get("5").is_some());
}
