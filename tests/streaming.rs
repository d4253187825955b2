use std::io::Cursor;

use tokio::io::BufReader;

use cloudpull::client::Client;
use cloudpull::contract::MockInvoke;
use cloudpull::error::Error;
use cloudpull::listing::FileKind;
use cloudpull::runner::ToolStream;
use cloudpull::stream::{stream_pages, stream_records};

fn canned(lines: &str) -> ToolStream {
    ToolStream::from_reader(BufReader::new(Cursor::new(lines.as_bytes().to_vec())))
}

#[tokio::test]
async fn stream_delivers_every_record_in_input_order() {
    let input = "alpha.txt\n\nbeta.mp4\ntotal 3\ngamma.zip\n";
    let mut seen = Vec::new();

    stream_records(canned(input), false, |record| {
        seen.push(record.name);
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(seen, vec!["alpha.txt", "beta.mp4", "gamma.zip"]);
}

#[tokio::test]
async fn stream_skips_malformed_long_rows_silently() {
    let input = "drwx 0 1MB 2024-01-01 00:00 keep.pdf\nbroken row\ndrwx 0 2MB 2024-01-01 00:00 also keep.txt\n";
    let mut seen = Vec::new();

    stream_records(canned(input), true, |record| {
        seen.push((record.name, record.size));
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(
        seen,
        vec![
            ("keep.pdf".to_string(), 1_048_576),
            ("also keep.txt".to_string(), 2_097_152),
        ]
    );
}

#[tokio::test]
async fn callback_error_aborts_the_stream() {
    let input = "one.txt\ntwo.txt\nthree.txt\n";
    let mut calls = 0;

    let err = stream_records(canned(input), false, |_| {
        calls += 1;
        if calls == 2 {
            anyhow::bail!("consumer gave up");
        }
        Ok(())
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::CallbackFailed(_)));
    assert!(err.to_string().contains("callback"));
    assert_eq!(calls, 2);
}

#[tokio::test]
async fn pagination_splits_into_ceil_n_over_page_size_pages() {
    let input = (1..=10)
        .map(|i| format!("file{i}.txt\n"))
        .collect::<String>();
    let mut pages = Vec::new();

    stream_pages(canned(&input), false, 4, |page, number| {
        pages.push((number, page.len()));
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(pages, vec![(1, 4), (2, 4), (3, 2)]);
}

#[tokio::test]
async fn pagination_never_delivers_an_empty_trailing_page() {
    let input = (1..=8).map(|i| format!("file{i}.txt\n")).collect::<String>();
    let mut pages = Vec::new();

    stream_pages(canned(&input), false, 4, |page, number| {
        assert!(!page.is_empty());
        pages.push(number);
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(pages, vec![1, 2]);
}

#[tokio::test]
async fn pagination_preserves_record_order_across_pages() {
    let input = "a.txt\nb.txt\nc.txt\nd.txt\ne.txt\n";
    let mut names = Vec::new();

    stream_pages(canned(input), false, 2, |page, _| {
        names.extend(page.into_iter().map(|r| r.name));
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt", "d.txt", "e.txt"]);
}

#[tokio::test]
async fn page_callback_error_stops_the_stream() {
    let input = (1..=10).map(|i| format!("file{i}.txt\n")).collect::<String>();
    let mut pages = 0;

    let err = stream_pages(canned(&input), false, 3, |_, _| {
        pages += 1;
        anyhow::bail!("page handler failed")
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::CallbackFailed(_)));
    assert_eq!(pages, 1);
}

#[tokio::test]
async fn client_streams_through_the_invocation_contract() {
    let mut invoker = MockInvoke::new();
    invoker
        .expect_spawn_streaming()
        .withf(|args| args.first().map(String::as_str) == Some("ls"))
        .returning(|_| {
            Ok(ToolStream::from_reader(BufReader::new(Cursor::new(
                b"one.txt\ntwo.txt\n".to_vec(),
            ))))
        });

    let client = Client::with_invoker(invoker);
    let mut count = 0;
    client
        .list_files_stream("/", false, false, |_| {
            count += 1;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(count, 2);
    let snapshot = client.metrics_snapshot();
    assert_eq!(snapshot.operations, 1);
    assert_eq!(snapshot.last_operation, "list_files_stream");
}

#[tokio::test]
async fn client_parses_buffered_listing_and_records_metrics() {
    let mut invoker = MockInvoke::new();
    invoker.expect_run_capture().returning(|_, _| {
        Ok("total 2\ndrwx 0 150MB 2024-01-01 00:00 My File.txt\ndrwx 0 1GB 2024-01-01 00:00 video.mp4\n".to_string())
    });

    let client = Client::with_invoker(invoker);
    let files = client.list_files("/", true, false).await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name, "My File.txt");
    assert_eq!(files[0].size, 157_286_400);
    assert_eq!(files[0].kind, FileKind::Document);
    assert_eq!(files[1].kind, FileKind::Video);

    let snapshot = client.metrics_snapshot();
    assert_eq!(snapshot.operations, 1);
    assert_eq!(snapshot.errors, 0);
    assert!(snapshot.memory_delta > 0);
}

#[tokio::test]
async fn client_quota_failure_counts_as_an_error() {
    let mut invoker = MockInvoke::new();
    invoker
        .expect_run_capture()
        .returning(|_, _| Err(Error::Timeout(std::time::Duration::from_secs(30))));

    let client = Client::with_invoker(invoker);
    let err = client.quota().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    let snapshot = client.metrics_snapshot();
    assert_eq!(snapshot.operations, 1);
    assert_eq!(snapshot.errors, 1);
}

#[tokio::test]
async fn client_quota_parses_header_and_data_row() {
    let mut invoker = MockInvoke::new();
    invoker
        .expect_run_capture()
        .returning(|_, _| Ok("total     used\n10GB      2GB\n".to_string()));

    let client = Client::with_invoker(invoker);
    let quota = client.quota().await.unwrap();
    assert_eq!(quota.total, 10_737_418_240);
    assert_eq!(quota.used, 2_147_483_648);
}
