use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;
use urlfs::{
    to_io_reader, to_io_writer, BoxReadCloser, Context, Error, FileSystem, LocalFileSystem,
    Operation, ReadCloser, ReadCloserExt, Registry, UrlfsConfig, WriteCloser, WriteCloserExt,
};

/// Read-only object store kept in memory, standing in for a remote backend
#[derive(Debug, Default)]
struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    /// Simulated latency of every open
    latency: Duration,
}

struct MemoryObject {
    data: Vec<u8>,
    pos: usize,
}

#[async_trait]
impl ReadCloser for MemoryObject {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> urlfs::Result<usize> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    async fn close(&mut self, _ctx: &Context) -> urlfs::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl FileSystem for MemoryStore {
    async fn open_reader(&self, ctx: &Context, url: &Url) -> urlfs::Result<BoxReadCloser> {
        ctx.run(async {
            tokio::time::sleep(self.latency).await;
            Ok(())
        })
        .await?;

        let objects = self.objects.lock().unwrap();
        let data = objects
            .get(url.path())
            .cloned()
            .ok_or_else(|| Error::PathNotFound {
                path: url.path().to_string(),
            })?;
        Ok(Box::new(MemoryObject { data, pos: 0 }))
    }

    async fn list_entries(&self, _ctx: &Context, url: &Url) -> urlfs::Result<Vec<String>> {
        let prefix = format!("{}/", url.path().trim_end_matches('/'));
        let mut names: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn memory_store(latency: Duration, objects: &[(&str, &[u8])]) -> Arc<MemoryStore> {
    let store = MemoryStore {
        latency,
        ..Default::default()
    };
    {
        let mut map = store.objects.lock().unwrap();
        for (path, data) in objects {
            map.insert(path.to_string(), data.to_vec());
        }
    }
    Arc::new(store)
}

fn setup() -> Result<(tempfile::TempDir, Registry)> {
    let temp_dir = tempfile::tempdir()?;
    let registry = Registry::new();
    registry.register("file", Arc::new(LocalFileSystem::with_root(temp_dir.path())));
    registry.register(
        "mem",
        memory_store(Duration::ZERO, &[("/docs/a.txt", b"alpha"), ("/docs/b.txt", b"beta")]),
    );
    Ok((temp_dir, registry))
}

#[tokio::test]
async fn test_full_flow() -> Result<()> {
    let (temp_dir, registry) = setup()?;
    let ctx = Context::background().with_timeout(Duration::from_secs(10));

    // 1. Write through the dispatch layer
    let target = Url::parse("file:///reports/daily.csv")?;
    let mut writer = registry.open_writer(&ctx, &target).await?;
    writer.write_all(&ctx, b"day,count\nmon,3\n").await?;
    writer.close(&ctx).await?;
    assert!(temp_dir.path().join("reports/daily.csv").exists());

    // 2. Append
    let mut appender = registry.open_appender(&ctx, &target).await?;
    appender.write_all(&ctx, b"tue,5\n").await?;
    appender.close(&ctx).await?;

    // 3. Read back
    let mut reader = registry.open_reader(&ctx, &target).await?;
    let mut contents = Vec::new();
    reader.read_to_end(&ctx, &mut contents).await?;
    reader.close(&ctx).await?;
    assert_eq!(contents, b"day,count\nmon,3\ntue,5\n");

    // 4. List
    let entries = registry
        .list_entries(&ctx, &Url::parse("file:///reports")?)
        .await?;
    assert_eq!(entries, vec!["daily.csv".to_string()]);

    // 5. Remove
    registry.remove(&ctx, &target).await?;
    let err = registry.open_reader(&ctx, &target).await.err().unwrap();
    assert!(matches!(err, Error::PathNotFound { .. }));

    Ok(())
}

#[tokio::test]
async fn test_schemes_route_to_their_backends() -> Result<()> {
    let (_temp_dir, registry) = setup()?;
    let ctx = Context::background();

    let entries = registry
        .list_entries(&ctx, &Url::parse("mem:///docs")?)
        .await?;
    assert_eq!(entries, vec!["a.txt".to_string(), "b.txt".to_string()]);

    let mut reader = registry
        .open_reader(&ctx, &Url::parse("mem:///docs/b.txt")?)
        .await?;
    let mut contents = Vec::new();
    reader.read_to_end(&ctx, &mut contents).await?;
    assert_eq!(contents, b"beta");

    Ok(())
}

#[tokio::test]
async fn test_three_error_conditions_are_distinct() -> Result<()> {
    let (_temp_dir, registry) = setup()?;
    let ctx = Context::background();

    // Nothing registered for the scheme
    let err = registry
        .remove(&ctx, &Url::parse("s3://bucket/key")?)
        .await
        .unwrap_err();
    assert!(err.is_no_filesystem());

    // Backend lacks the capability
    let err = registry
        .remove(&ctx, &Url::parse("mem:///docs/a.txt")?)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Unsupported {
            operation: Operation::Remove
        }
    ));

    // Backend's own error
    let err = registry
        .open_reader(&ctx, &Url::parse("mem:///docs/zzz.txt")?)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::PathNotFound { path } if path == "/docs/zzz.txt"));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_deadline_reaches_backend() -> Result<()> {
    let registry = Registry::new();
    registry.register(
        "slow",
        memory_store(Duration::from_secs(30), &[("/x", b"late")]),
    );

    let ctx = Context::background().with_timeout(Duration::from_secs(1));
    let err = registry
        .open_reader(&ctx, &Url::parse("slow:///x")?)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::DeadlineExceeded));

    Ok(())
}

#[tokio::test]
async fn test_limited_reader_over_backend_stream() -> Result<()> {
    let (_temp_dir, registry) = setup()?;
    let ctx = Context::background();

    let big = Url::parse("file:///big.bin")?;
    let mut writer = registry.open_writer(&ctx, &big).await?;
    writer.write_all(&ctx, &vec![7u8; 10_000]).await?;
    writer.close(&ctx).await?;

    let mut limited = registry.open_reader(&ctx, &big).await?.take(4_096);
    let mut buf = vec![0u8; 3_000];
    assert_eq!(limited.read(&ctx, &mut buf).await?, 3_000);
    assert_eq!(limited.read(&ctx, &mut buf).await?, 1_096);
    assert_eq!(limited.read(&ctx, &mut buf).await?, 0);
    assert_eq!(limited.remaining(), 0);
    limited.close(&ctx).await?;

    Ok(())
}

#[tokio::test]
async fn test_compat_adapters_with_tokio_io() -> Result<()> {
    let (_temp_dir, registry) = setup()?;
    let ctx = Context::background();
    let target = Url::parse("file:///compat/out.txt")?;

    let writer = registry.open_writer(&ctx, &target).await?;
    let mut writer = to_io_writer(writer);
    writer.write_all(b"written by a context-free caller").await?;
    writer.shutdown().await?;

    let reader = registry.open_reader(&ctx, &target).await?;
    let mut reader = to_io_reader(reader);
    let mut text = String::new();
    reader.read_to_string(&mut text).await?;
    reader.close().await?;
    assert_eq!(text, "written by a context-free caller");

    Ok(())
}

#[tokio::test]
async fn test_registry_from_config_file() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let data_dir = temp_dir.path().join("data");
    std::fs::create_dir_all(&data_dir)?;
    std::fs::write(data_dir.join("hello.txt"), b"hi")?;

    let config_path = temp_dir.path().join("urlfs.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{"local": {{"scheme": "disk", "root": {:?}, "watch_interval": 50}}}}"#,
            data_dir.to_string_lossy()
        ),
    )?;

    let config = UrlfsConfig::load(&config_path)?;
    let registry = Registry::from_config(&config)?;
    assert!(registry.has("disk"));
    assert!(!registry.has("file"));

    let ctx = Context::background();
    let mut reader = registry
        .open_reader(&ctx, &Url::parse("disk:///hello.txt")?)
        .await?;
    let mut contents = Vec::new();
    reader.read_to_end(&ctx, &mut contents).await?;
    assert_eq!(contents, b"hi");

    Ok(())
}
