//! Concurrent file reads with an ordered join.

use std::future::Future;
use std::time::Duration;

use futures_util::future::try_join_all;
use tokio_util::sync::CancellationToken;

use crate::IngestError;
use crate::merge::decode;
use crate::selection::{FileSource, SelectedFile};

/// Read and decode one file.
pub async fn read_file(
    file: &SelectedFile,
    timeout: Option<Duration>,
) -> Result<String, IngestError> {
    let text = match &file.source {
        FileSource::Memory(bytes) => decode(&file.name, bytes)?,
        FileSource::Disk(path) => {
            let result = bounded(&file.name, timeout, tokio::fs::read(path)).await?;
            let bytes = result.map_err(|source| IngestError::Read {
                name: file.name.clone(),
                source,
            })?;
            decode(&file.name, &bytes)?
        }
    };
    tracing::debug!(name = %file.name, bytes = text.len(), "read file");
    Ok(text)
}

/// Await `read`, failing with [`IngestError::ReadTimeout`] once `timeout` elapses.
async fn bounded<T>(
    name: &str,
    timeout: Option<Duration>,
    read: impl Future<Output = T>,
) -> Result<T, IngestError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| IngestError::ReadTimeout {
                name: name.to_string(),
                timeout: limit,
            }),
        None => Ok(read.await),
    }
}

/// Run `op` on every item concurrently and collect the outputs in input
/// order, whatever order they finish in.
///
/// The first error aborts the rest. Resolves to `Ok(None)` if `cancel`
/// fires first.
pub async fn join_in_order<'a, T, O, F, Fut>(
    items: &'a [T],
    op: F,
    cancel: &CancellationToken,
) -> Result<Option<Vec<O>>, IngestError>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<O, IngestError>>,
{
    let all = try_join_all(items.iter().map(op));
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        result = all => result.map(Some),
    }
}

/// Read every file concurrently; contents come back in selection order.
pub async fn read_all(
    files: &[&SelectedFile],
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<Option<Vec<String>>, IngestError> {
    join_in_order(files, |file| read_file(file, timeout), cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selection;

    #[tokio::test(start_paused = true)]
    async fn output_order_ignores_completion_order() {
        // Later items finish first.
        let delays = [30u64, 20, 10];
        let out = join_in_order(
            &delays,
            |ms| async move {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(*ms)
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(out, vec![30, 20, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_error_wins() {
        let items = [1u8, 2, 3];
        let err = join_in_order(
            &items,
            |n| async move {
                if *n == 2 {
                    Err(IngestError::Decode {
                        name: "two.csv".into(),
                    })
                } else {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(*n)
                }
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::Decode { .. }));
    }

    #[tokio::test]
    async fn cancelled_join_yields_none() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let items = [1u8];
        let out = join_in_order(
            &items,
            |_| std::future::pending::<Result<u8, IngestError>>(),
            &cancel,
        )
        .await
        .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_read_times_out() {
        let limit = Duration::from_millis(200);
        let err = bounded("stuck.csv", Some(limit), std::future::pending::<()>())
            .await
            .unwrap_err();
        match err {
            IngestError::ReadTimeout { name, timeout } => {
                assert_eq!(name, "stuck.csv");
                assert_eq!(timeout, limit);
            }
            other => panic!("expected ReadTimeout, got {other:?}"),
        }
        assert_eq!(
            bounded("quick.csv", Some(limit), async { 7 }).await.unwrap(),
            7
        );
    }

    #[tokio::test]
    async fn memory_and_disk_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.csv");
        tokio::fs::write(&path, "h\r\n1").await.unwrap();

        let disk = Selection::from_paths([&path]);
        let mem = Selection::from_memory([("mem.csv", "h\n2")]);
        let files: Vec<&SelectedFile> = disk.files().iter().chain(mem.files()).collect();

        let out = read_all(&files, None, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, vec!["h\r\n1".to_string(), "h\n2".to_string()]);
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let selection = Selection::from_paths([dir.path().join("gone.csv")]);
        let err = read_file(&selection.files()[0], Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Read { name, .. } if name == "gone.csv"));
    }
}
