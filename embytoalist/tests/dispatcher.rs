//! End-to-end dispatcher tests against stubbed Emby / Alist / storage
//! backends.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use embytoalist::http::router;
use embytoalist::state::AppState;
use embytoalist_core::cache::{CacheStore, FragmentRange};
use embytoalist_core::models::FileDescriptor;
use embytoalist_core::Config;

/// size 10 MB with a 30-byte head window (bitrate 16 bit/s) keeps fragments
/// tiny while leaving a genuine middle region outside both cache windows.
const SIZE: u64 = 10_000_000;
const BITRATE: u64 = 16;
const HEAD_END: u64 = 29;

struct TestEnv {
    #[allow(dead_code)]
    emby: MockServer,
    #[allow(dead_code)]
    alist: MockServer,
    upstream: MockServer,
    cache_dir: tempfile::TempDir,
    router: axum::Router,
}

fn payload() -> Vec<u8> {
    (0..100u8).collect()
}

fn descriptor() -> FileDescriptor {
    FileDescriptor {
        mount_path: "/mnt/media/Movies/A/a.mkv".to_string(),
        path: "/Movies/A/a.mkv".to_string(),
        size: SIZE,
        container: "mkv".to_string(),
        bitrate: BITRATE,
        name: "a".to_string(),
        is_indirection: false,
    }
}

async fn setup(mount_path: &str, cache_enable: bool) -> TestEnv {
    let emby = MockServer::start().await;
    let alist = MockServer::start().await;
    let upstream = MockServer::start().await;
    let cache_dir = tempfile::tempdir().expect("tempdir");

    Mock::given(method("GET"))
        .and(path("/emby/Items/42/PlaybackInfo"))
        .and(query_param("MediaSourceId", "ms1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [{
                "Id": "ms1",
                "Path": mount_path,
                "Name": "a",
                "Container": "mkv",
                "Bitrate": BITRATE,
                "Size": SIZE,
                "IsRemote": false
            }]
        })))
        .mount(&emby)
        .await;

    Mock::given(method("GET"))
        .and(path("/emby/Items"))
        .and(query_param("Ids", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "42", "Type": "Movie"}]
        })))
        .mount(&emby)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/fs/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "success",
            "data": {
                "name": "a.mkv",
                "size": SIZE,
                "is_dir": false,
                "raw_url": format!("{}/file", upstream.uri())
            }
        })))
        .mount(&alist)
        .await;

    let config = Config {
        emby_server: emby.uri(),
        alist_server: alist.uri(),
        alist_api_key: "token".to_string(),
        mount_path_prefix_remove: "/mnt/media".to_string(),
        ignore_path: vec!["/mnt/local".to_string()],
        cache_enable,
        cache_path: cache_dir.path().join("cache").to_string_lossy().into_owned(),
        ..Config::default()
    };

    let state = AppState::initialize(config).await.expect("state");
    let router = router(state);

    TestEnv {
        emby,
        alist,
        upstream,
        cache_dir,
        router,
    }
}

impl TestEnv {
    async fn store(&self) -> CacheStore {
        CacheStore::open(self.cache_dir.path().join("cache"))
            .await
            .expect("open store")
    }

    async fn put_fragment(&self, range: FragmentRange, data: &[u8]) {
        let store = self.store().await;
        let writer = store
            .writer(&descriptor(), range)
            .await
            .expect("writer")
            .expect("allocated");
        writer.push(Bytes::copy_from_slice(data)).await;
        writer.close().await.expect("close");
    }

    async fn request(&self, uri: &str, range: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder().uri(uri).header("User-Agent", "vlc/3.0");
        if let Some(range) = range {
            builder = builder.header("Range", range);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).expect("request"))
            .await
            .expect("response")
    }
}

fn header_str<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_missing_media_source_id_is_bad_request() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let response = env.request("/Videos/42/file.mkv?api_key=k", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_no_range_redirects_to_direct_url() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let response = env
        .request("/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k", None)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        header_str(&response, "Location"),
        Some(format!("{}/file", env.upstream.uri()).as_str())
    );
}

#[tokio::test]
async fn test_cache_disabled_always_redirects() {
    let env = setup("/mnt/media/Movies/A/a.mkv", false).await;
    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some("bytes=0-"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_middle_range_redirects() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some("bytes=5000000-5999999"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        header_str(&response, "Location"),
        Some(format!("{}/file", env.upstream.uri()).as_str())
    );
}

#[tokio::test]
async fn test_start_past_eof_is_416() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some("bytes=20000000-"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        header_str(&response, "Content-Range"),
        Some(format!("bytes */{SIZE}").as_str())
    );
}

#[tokio::test]
async fn test_bypassed_path_redirects_under_prevent_redirect() {
    let env = setup("/mnt/local/a.mkv", true).await;
    let uri = "/emby/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k";
    let response = env.request(uri, Some("bytes=0-")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let expected = format!("{}/preventRedirect{uri}", env.emby.uri());
    assert_eq!(header_str(&response, "Location"), Some(expected.as_str()));
}

#[tokio::test]
async fn test_cached_head_serves_206_from_disk() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let head = FragmentRange { start: 0, end: HEAD_END };
    env.put_fragment(head, &payload()[..30]).await;

    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some("bytes=0-9"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "X-EmbyToAList-Cache"), Some("Hit"));
    assert_eq!(
        header_str(&response, "Content-Range"),
        Some(format!("bytes 0-9/{SIZE}").as_str())
    );
    assert_eq!(header_str(&response, "Content-Length"), Some("10"));
    assert_eq!(header_str(&response, "Content-Type"), Some("video/x-matroska"));
    assert_eq!(header_str(&response, "Accept-Ranges"), Some("bytes"));

    let body = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(body.as_ref(), &payload()[..10]);
}

#[tokio::test]
async fn test_cached_tail_serves_hit_tail() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let tail = FragmentRange { start: SIZE - 5, end: SIZE - 1 };
    env.put_fragment(tail, b"tail!").await;

    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some(&format!("bytes={}-", SIZE - 5)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "X-EmbyToAList-Cache"), Some("Hit_Tail"));
    assert_eq!(
        header_str(&response, "Content-Range"),
        Some(format!("bytes {}-{}/{SIZE}", SIZE - 5, SIZE - 1).as_str())
    );

    let body = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(body.as_ref(), b"tail!");
}

#[tokio::test]
async fn test_head_miss_splices_and_populates_cache() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let data = payload();
    Mock::given(method("GET"))
        .and(path("/file"))
        .and(header("Range", "bytes=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "video/x-matroska")
                .set_body_bytes(data.clone()),
        )
        .expect(1)
        .mount(&env.upstream)
        .await;

    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some("bytes=0-"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "X-EmbyToAList-Cache"), Some("Partial"));
    assert_eq!(
        header_str(&response, "Content-Range"),
        Some(format!("bytes 0-{}/{SIZE}", SIZE - 1).as_str())
    );
    assert_eq!(
        header_str(&response, "Content-Length"),
        Some(SIZE.to_string().as_str())
    );

    let body = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(body.as_ref(), data.as_slice());

    // the tee filled the head fragment with the first 30 upstream bytes
    let store = env.store().await;
    assert!(store.present(&descriptor(), 0).await);
    let mut cached = Vec::new();
    let mut stream = store.read(&descriptor(), 0, None).await.expect("read");
    while let Some(chunk) = stream.next().await {
        cached.extend_from_slice(&chunk);
    }
    assert_eq!(cached, &data[..30]);
}

#[tokio::test]
async fn test_cached_head_splices_prefix_then_upstream() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let data = payload();
    let head = FragmentRange { start: 0, end: HEAD_END };
    env.put_fragment(head, &data[..30]).await;

    // replay only fetches the remainder, from the cache frontier
    Mock::given(method("GET"))
        .and(path("/file"))
        .and(header("Range", "bytes=30-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "video/x-matroska")
                .set_body_bytes(data[30..].to_vec()),
        )
        .expect(1)
        .mount(&env.upstream)
        .await;

    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some("bytes=0-"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "X-EmbyToAList-Cache"), Some("Hit"));

    // cache prefix strictly before upstream bytes, no interleaving
    let body = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_tail_miss_splices_with_tee() {
    let env = setup("/mnt/media/Movies/A/a.mkv", true).await;
    let start = SIZE - 8;
    Mock::given(method("GET"))
        .and(path("/file"))
        .and(header("Range", format!("bytes={start}-").as_str()))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "video/x-matroska")
                .set_body_bytes(b"trailers".to_vec()),
        )
        .expect(1)
        .mount(&env.upstream)
        .await;

    let response = env
        .request(
            "/Videos/42/file.mkv?MediaSourceId=ms1&api_key=k",
            Some(&format!("bytes={start}-")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "X-EmbyToAList-Cache"), Some("Miss"));

    let body = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(body.as_ref(), b"trailers");

    // replay is a tail hit served from disk
    let store = env.store().await;
    assert!(store.present(&descriptor(), start).await);
}
