use super::*;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;

#[derive(Default, Clone)]
struct RecordingFetch {
    batches: Arc<Mutex<Vec<Vec<u32>>>>,
    failing: bool,
}

impl RecordingFetch {
    fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn batches(&self) -> Vec<Vec<u32>> {
        self.batches.lock().expect("batches mutex poisoned").clone()
    }
}

#[async_trait]
impl BatchFn for RecordingFetch {
    type Key = u32;
    type Value = Option<String>;

    async fn load(&self, keys: &[u32]) -> Result<Vec<Option<String>>, LoaderError> {
        self.batches
            .lock()
            .expect("batches mutex poisoned")
            .push(keys.to_vec());
        if self.failing {
            return Err(StorageError::Unavailable("database offline".to_string()).into());
        }
        Ok(keys
            .iter()
            .map(|key| (key % 2 == 0).then(|| format!("value-{key}")))
            .collect())
    }
}

struct ShortFetch;

#[async_trait]
impl BatchFn for ShortFetch {
    type Key = u32;
    type Value = u32;

    async fn load(&self, keys: &[u32]) -> Result<Vec<u32>, LoaderError> {
        Ok(keys.iter().skip(1).copied().collect())
    }
}

/// Yields a few times inside every fetch and tracks how many fetches overlap.
#[derive(Default, Clone)]
struct SlowFetch {
    batches: Arc<Mutex<Vec<Vec<u32>>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl SlowFetch {
    fn batches(&self) -> Vec<Vec<u32>> {
        self.batches.lock().expect("batches mutex poisoned").clone()
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchFn for SlowFetch {
    type Key = u32;
    type Value = Option<String>;

    async fn load(&self, keys: &[u32]) -> Result<Vec<Option<String>>, LoaderError> {
        self.batches
            .lock()
            .expect("batches mutex poisoned")
            .push(keys.to_vec());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(keys.iter().map(|key| Some(format!("value-{key}"))).collect())
    }
}

struct StalledFetch;

#[async_trait]
impl BatchFn for StalledFetch {
    type Key = u32;
    type Value = u32;

    async fn load(&self, _keys: &[u32]) -> Result<Vec<u32>, LoaderError> {
        std::future::pending().await
    }
}

async fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    std::future::poll_fn(|cx| Poll::Ready(Pin::new(&mut *future).poll(cx))).await
}

fn value(key: u32) -> Option<String> {
    Some(format!("value-{key}"))
}

#[tokio::test]
async fn load_many_keeps_request_order_and_duplicates() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::new(fetch.clone());

    let values = loader
        .load_many(&[4, 1, 4, 2])
        .await
        .expect("batch resolves");

    assert_eq!(values, vec![value(4), None, value(4), value(2)]);
    assert_eq!(fetch.batches(), vec![vec![4, 1, 2]]);
}

#[tokio::test]
async fn empty_request_resolves_without_fetching() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::new(fetch.clone());

    let values = loader.load_many(&[]).await.expect("empty batch resolves");

    assert!(values.is_empty());
    assert!(fetch.batches().is_empty());
}

#[tokio::test]
async fn concurrent_loads_in_one_window_share_a_fetch() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::new(fetch.clone());

    let (first, many, last) = tokio::join!(
        loader.load(2),
        loader.load_many(&[4, 2, 3]),
        loader.load(6)
    );

    assert_eq!(first.expect("first resolves"), value(2));
    assert_eq!(many.expect("many resolves"), vec![value(4), value(2), None]);
    assert_eq!(last.expect("last resolves"), value(6));
    assert_eq!(fetch.batches(), vec![vec![2, 4, 3, 6]]);
}

#[tokio::test]
async fn resolved_keys_are_memoized() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::new(fetch.clone());

    loader.load(2).await.expect("first load");
    let values = loader.load_many(&[2, 8]).await.expect("second load");

    assert_eq!(values, vec![value(2), value(8)]);
    assert_eq!(fetch.batches(), vec![vec![2], vec![8]]);
}

#[tokio::test]
async fn clear_forces_a_refetch() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::new(fetch.clone());

    loader.load(2).await.expect("first load");
    loader.clear(&2);
    loader.load(2).await.expect("reload");
    loader.clear_all();
    loader.load(2).await.expect("reload after clear_all");

    assert_eq!(fetch.batches(), vec![vec![2], vec![2], vec![2]]);
}

#[tokio::test]
async fn disabled_cache_refetches_every_window() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::with_options(
        fetch.clone(),
        LoaderOptions {
            cache: false,
            ..LoaderOptions::default()
        },
    );

    loader.load(2).await.expect("first load");
    loader.load(2).await.expect("second load");

    assert_eq!(fetch.batches(), vec![vec![2], vec![2]]);
}

#[tokio::test]
async fn primed_values_skip_the_fetch() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::new(fetch.clone());
    loader.prime(3, Some("primed".to_string()));
    loader.prime(3, Some("ignored".to_string()));

    let primed = loader.load(3).await.expect("primed load");

    assert_eq!(primed, Some("primed".to_string()));
    assert!(fetch.batches().is_empty());
}

#[tokio::test]
async fn fetch_failure_reaches_every_caller_and_is_not_cached() {
    let fetch = RecordingFetch::failing();
    let loader = BatchLoader::new(fetch.clone());

    let (first, second) = tokio::join!(loader.load(1), loader.load_many(&[2, 1]));
    let expected = LoaderError::Storage(StorageError::Unavailable("database offline".to_string()));
    assert_eq!(first.unwrap_err(), expected);
    assert_eq!(second.unwrap_err(), expected);

    let retry = loader.load(1).await;
    assert!(retry.is_err());
    assert_eq!(fetch.batches(), vec![vec![1, 2], vec![1]]);
}

#[tokio::test]
async fn max_batch_size_splits_a_window() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::with_options(
        fetch.clone(),
        LoaderOptions {
            max_batch_size: Some(2),
            cache: true,
        },
    );

    let values = loader
        .load_many(&[1, 2, 3, 4, 5])
        .await
        .expect("chunks resolve");

    assert_eq!(values, vec![None, value(2), None, value(4), None]);
    assert_eq!(fetch.batches(), vec![vec![1, 2], vec![3, 4], vec![5]]);
}

#[tokio::test]
async fn misaligned_fetch_output_is_an_error() {
    let loader = BatchLoader::new(ShortFetch);

    let result = loader.load_many(&[1, 2, 3]).await;

    assert_eq!(
        result.unwrap_err(),
        LoaderError::Misaligned {
            expected: 3,
            actual: 2
        }
    );
}

#[tokio::test]
async fn loaders_do_not_share_state() {
    let fetch = RecordingFetch::default();
    let first = BatchLoader::new(fetch.clone());
    let second = BatchLoader::new(fetch.clone());

    first.load(2).await.expect("first loader");
    second.load(2).await.expect("second loader");

    assert_eq!(fetch.batches(), vec![vec![2], vec![2]]);
}

#[tokio::test]
async fn explicit_dispatch_is_idempotent_when_nothing_is_queued() {
    let fetch = RecordingFetch::default();
    let loader = BatchLoader::new(fetch.clone());

    loader.dispatch().await;
    loader.load(4).await.expect("load");
    loader.dispatch().await;

    assert_eq!(fetch.batches(), vec![vec![4]]);
}

#[tokio::test]
async fn dropping_the_dispatching_caller_cancels_its_window() {
    let loader = BatchLoader::new(StalledFetch);
    let mut dispatcher = Box::pin(loader.load(1));
    let mut waiter = Box::pin(loader.load(1));

    assert!(poll_once(&mut dispatcher).await.is_pending());
    assert!(poll_once(&mut waiter).await.is_pending());
    // Second poll closes the window and parks inside the stalled fetch.
    assert!(poll_once(&mut dispatcher).await.is_pending());
    drop(dispatcher);

    assert_eq!(waiter.await, Err(LoaderError::Cancelled));
}

#[tokio::test]
async fn key_with_a_running_fetch_is_not_fetched_again() {
    let fetch = SlowFetch::default();
    let loader = BatchLoader::new(fetch.clone());

    let (first, late) = tokio::join!(loader.load(2), async {
        // Arrive once the first window is already being fetched.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        loader.load(2).await
    });

    assert_eq!(first.expect("first resolves"), value(2));
    assert_eq!(late.expect("late caller resolves"), value(2));
    assert_eq!(fetch.batches(), vec![vec![2]]);
    assert_eq!(fetch.peak(), 1);
}

#[tokio::test]
async fn running_fetch_is_shared_even_without_the_cache() {
    let fetch = SlowFetch::default();
    let loader = BatchLoader::with_options(
        fetch.clone(),
        LoaderOptions {
            cache: false,
            ..LoaderOptions::default()
        },
    );

    let (first, late) = tokio::join!(loader.load(3), async {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        loader.load(3).await
    });

    assert_eq!(first.expect("first resolves"), value(3));
    assert_eq!(late.expect("late caller resolves"), value(3));
    assert_eq!(fetch.batches(), vec![vec![3]]);

    loader.load(3).await.expect("reload");
    assert_eq!(fetch.batches(), vec![vec![3], vec![3]]);
}

#[tokio::test]
async fn chunks_of_a_window_are_fetched_one_at_a_time() {
    let fetch = SlowFetch::default();
    let loader = BatchLoader::with_options(
        fetch.clone(),
        LoaderOptions {
            max_batch_size: Some(1),
            cache: true,
        },
    );

    let (first, second, third) = tokio::join!(loader.load(1), loader.load(2), loader.load(3));

    assert_eq!(first.expect("first resolves"), value(1));
    assert_eq!(second.expect("second resolves"), value(2));
    assert_eq!(third.expect("third resolves"), value(3));
    assert_eq!(fetch.batches(), vec![vec![1], vec![2], vec![3]]);
    assert_eq!(fetch.peak(), 1);
}

#[tokio::test]
async fn options_are_exposed_as_configured() {
    let options = LoaderOptions {
        max_batch_size: Some(7),
        cache: false,
    };
    let loader = BatchLoader::with_options(RecordingFetch::default(), options);

    assert_eq!(loader.options(), options);
    assert_eq!(BatchLoader::new(ShortFetch).options(), LoaderOptions::default());
}
