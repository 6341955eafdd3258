use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;
use urlfs::{
    BoxReadCloser, Context, FileWatchFn, LocalFileSystem, ReadCloserExt, Registry, WriteCloser,
    WriteCloserExt,
};

async fn put(registry: &Registry, url: &Url, data: &[u8]) -> Result<()> {
    let ctx = Context::background();
    let mut writer = registry.open_writer(&ctx, url).await?;
    writer.write_all(&ctx, data).await?;
    writer.close(&ctx).await?;
    Ok(())
}

#[tokio::test]
async fn test_watch_through_registry() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let temp_dir = tempfile::tempdir()?;
    let registry = Registry::new();
    registry.register(
        "file",
        Arc::new(
            LocalFileSystem::with_root(temp_dir.path()).watch_interval(Duration::from_millis(20)),
        ),
    );

    let target = Url::parse("file:///config/app.json")?;
    put(&registry, &target, b"{}").await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher: FileWatchFn = Arc::new(move |url: Url, reader: BoxReadCloser| {
        let _ = tx.send((url, reader));
    });
    let watch = registry
        .watch_file(&Context::background(), &target, watcher)
        .await?;

    for version in 1..=3 {
        // Lengths differ so coarse mtime granularity cannot hide a change
        let body = format!("{{\"version\": {}, \"pad\": \"{}\"}}", version, "x".repeat(version));
        put(&registry, &target, body.as_bytes()).await?;

        let (changed, mut reader) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await?
            .expect("watch stopped early");
        assert_eq!(changed, target);

        let mut contents = Vec::new();
        reader
            .read_to_end(&Context::background(), &mut contents)
            .await?;
        assert_eq!(contents, body.as_bytes());
    }

    watch.cancel()?;
    Ok(())
}

#[tokio::test]
async fn test_watch_unknown_scheme() -> Result<()> {
    let registry = Registry::new();
    let watcher: FileWatchFn = Arc::new(|_: Url, _: BoxReadCloser| {});
    let err = registry
        .watch_file(
            &Context::background(),
            &Url::parse("ftp://host/file")?,
            watcher,
        )
        .await
        .unwrap_err();
    assert!(err.is_no_filesystem());
    Ok(())
}
