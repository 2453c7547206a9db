use depot::config::Config;
use depot::coordinator::Depot;
use depot::error::DepotError;
use depot::utils::digest::ContentHash;

fn test_config(root: &std::path::Path) -> Config {
    Config {
        root_dir: root.display().to_string(),
        database_url: "sqlite::memory:".to_string(),
        db_connections: 1,
        cache_capacity: 16 * 1024 * 1024,
        cache_ttl_secs: 60,
        max_upload: 1024 * 1024,
        retry_attempts: 2,
        retry_backoff_ms: 10,
    }
}

async fn depot() -> (tempfile::TempDir, Depot) {
    let tmp = tempfile::tempdir().unwrap();
    let depot = Depot::bootstrap(&test_config(tmp.path())).await.unwrap();
    (tmp, depot)
}

#[tokio::test]
async fn upload_resolve_overwrite_delete_scenario() {
    let (_tmp, depot) = depot().await;
    let h1 = ContentHash::of(b"hello");
    let h2 = ContentHash::of(b"world");

    let record = depot
        .upload("a", "report.txt", b"hello", "text/plain")
        .await
        .unwrap();
    assert_eq!(record.hash, h1);
    assert_eq!(record.size, 5);

    let resolved = depot.resolve("a", "report.txt").await.unwrap();
    assert_eq!(resolved.hash, h1);
    assert_eq!(resolved.size, 5);

    depot
        .upload("a", "report.txt", b"world", "text/plain")
        .await
        .unwrap();
    let resolved = depot.resolve("a", "report.txt").await.unwrap();
    assert_eq!(resolved.hash, h2);
    // the replaced content is now collectible
    assert!(depot.orphaned(10).await.unwrap().contains(&h1));

    depot.delete("a", "report.txt").await.unwrap();
    assert!(matches!(
        depot.resolve("a", "report.txt").await,
        Err(DepotError::NotFound(_))
    ));
    assert!(depot.orphaned(10).await.unwrap().contains(&h2));
}

#[tokio::test]
async fn download_returns_uploaded_bytes_with_cold_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.cache_capacity = 0; // NoopCache: every read goes to catalog + blobs
    let depot = Depot::bootstrap(&config).await.unwrap();

    let body = b"cold cache read".to_vec();
    depot
        .upload("a", "notes/cold.txt", &body, "text/plain")
        .await
        .unwrap();
    assert_eq!(depot.download("a", "notes/cold.txt").await.unwrap(), body);
    // a second read exercises the same fallback path
    assert_eq!(depot.download("a", "notes/cold.txt").await.unwrap(), body);
}

#[tokio::test]
async fn overwrite_invalidates_cached_content() {
    let (_tmp, depot) = depot().await;

    depot
        .upload("a", "live.txt", b"version one", "text/plain")
        .await
        .unwrap();
    // populate the cache
    assert_eq!(
        depot.download("a", "live.txt").await.unwrap(),
        b"version one"
    );

    depot
        .upload("a", "live.txt", b"version two", "text/plain")
        .await
        .unwrap();
    // no stale read after the upload invalidated the key
    assert_eq!(
        depot.download("a", "live.txt").await.unwrap(),
        b"version two"
    );
    assert_eq!(depot.resolve("a", "live.txt").await.unwrap().size, 11);
}

#[tokio::test]
async fn same_content_overwrite_keeps_a_single_reference() {
    let (_tmp, depot) = depot().await;
    let hash = ContentHash::of(b"identical");

    depot
        .upload("a", "dup.txt", b"identical", "text/plain")
        .await
        .unwrap();
    depot
        .upload("a", "dup.txt", b"identical", "text/plain")
        .await
        .unwrap();

    // still exactly one logical reference: deleting once fully orphans it
    assert!(depot.orphaned(10).await.unwrap().is_empty());
    depot.delete("a", "dup.txt").await.unwrap();
    assert_eq!(depot.orphaned(10).await.unwrap(), vec![hash]);
}

#[tokio::test]
async fn concurrent_uploads_to_one_path_leave_one_record() {
    let (_tmp, depot) = depot().await;
    let h_left = ContentHash::of(b"left contender");
    let h_right = ContentHash::of(b"right contender");

    let (left, right) = tokio::join!(
        depot.upload("a", "contended.bin", b"left contender", "application/octet-stream"),
        depot.upload("a", "contended.bin", b"right contender", "application/octet-stream"),
    );
    for result in [&left, &right] {
        match result {
            Ok(_) | Err(DepotError::Conflict(_)) => {}
            Err(other) => panic!("unexpected upload failure: {other}"),
        }
    }

    let survivor = depot.resolve("a", "contended.bin").await.unwrap();
    assert!(survivor.hash == h_left || survivor.hash == h_right);
    let body = depot.download("a", "contended.bin").await.unwrap();
    assert_eq!(ContentHash::of(&body), survivor.hash);

    // the losing write ends with zero references, whichever side lost
    let loser = if survivor.hash == h_left { h_right } else { h_left };
    let orphans = depot.orphaned(10).await.unwrap();
    assert!(orphans.contains(&loser));
    assert!(!orphans.contains(&survivor.hash));
}

#[tokio::test]
async fn uploads_to_distinct_paths_interleave_freely() {
    let (_tmp, depot) = depot().await;

    let uploads = (0..8).map(|i| {
        let depot = &depot;
        async move {
            let path = format!("bulk/file-{i}.bin");
            let body = format!("payload {i}").into_bytes();
            depot
                .upload("a", &path, &body, "application/octet-stream")
                .await
        }
    });
    let results = futures::future::join_all(uploads).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let listed = depot.list("a", 0, 100).await.unwrap();
    assert_eq!(listed.len(), 8);

    let stats = depot.stats().await.unwrap();
    assert_eq!(stats.blob_count, 8);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.max_upload = 8;
    let depot = Depot::bootstrap(&config).await.unwrap();

    let result = depot
        .upload("a", "big.bin", b"nine bytes", "application/octet-stream")
        .await;
    assert!(matches!(result, Err(DepotError::SizeInvalid(_))));
    // nothing was stored
    assert_eq!(depot.stats().await.unwrap().blob_count, 0);
}

#[tokio::test]
async fn invalid_names_are_rejected_before_any_io() {
    let (_tmp, depot) = depot().await;

    assert!(matches!(
        depot.upload("Bad Owner", "x.txt", b"x", "text/plain").await,
        Err(DepotError::NameInvalid(_))
    ));
    assert!(matches!(
        depot.upload("a", "../escape", b"x", "text/plain").await,
        Err(DepotError::NameInvalid(_))
    ));
    assert!(matches!(
        depot.download("a", "/absolute").await,
        Err(DepotError::NameInvalid(_))
    ));
}

#[tokio::test]
async fn download_of_unknown_path_is_not_found() {
    let (_tmp, depot) = depot().await;
    assert!(matches!(
        depot.download("a", "missing.txt").await,
        Err(DepotError::NotFound(_))
    ));
}
