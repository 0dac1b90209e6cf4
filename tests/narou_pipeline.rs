use std::io::Read as _;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use novelshelf::cache::Bookshelf;
use novelshelf::epub::{BuildOptions, build_episode_epub};
use novelshelf::narou::{EpisodeFetcher as _, NarouClient};

static LOGO_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

const EPISODE_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Stub Novel - Episode 1</title></head>
  <body>
    <h1 class="p-novel__title">Episode 1</h1>
    <div class="js-novel-text p-novel__text">
      <p id="L1">First paragraph of the stub episode.</p>
      <p id="L2">Second paragraph, year <span class="tcy">25</span>.</p>
      <p id="L3"><img src="/images/i001.png" alt="" /></p>
    </div>
  </body>
</html>
"#;

fn spawn_stub_narou() -> (String, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let addr = server.server_addr();
    let base_url = format!("http://{addr}");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            match shutdown_rx.try_recv() {
                Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
                Err(mpsc::TryRecvError::Empty) => {}
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let path = request.url().to_string();
            let response = match path.as_str() {
                "/n1234ab/1/" => {
                    tiny_http::Response::from_string(EPISODE_HTML).with_status_code(200)
                }
                "/images/i001.png" => {
                    tiny_http::Response::from_data(LOGO_PNG.to_vec()).with_status_code(200)
                }
                _ => tiny_http::Response::from_string("not found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    (base_url, shutdown_tx, handle)
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_build_and_publish_a_stub_episode() {
    let (base_url, shutdown, server_thread) = spawn_stub_narou();

    let client = NarouClient::new(&base_url, Duration::from_secs(5), true, true)
        .expect("build narou client");
    let fetched = client
        .fetch_episode("n1234ab", 1)
        .await
        .expect("fetch episode");

    assert_eq!(fetched.novel_title, "Stub Novel - Episode 1");
    assert_eq!(fetched.episode.title, "Episode 1");
    assert_eq!(fetched.episode.id, "1");
    assert_eq!(fetched.episode.paragraphs.len(), 2);
    assert_eq!(fetched.episode.images.len(), 1);
    assert_eq!(fetched.episode.images[0].id, "i001");
    assert_eq!(fetched.episode.images[0].data, LOGO_PNG);

    let dir = tempfile::tempdir().expect("tempdir");
    let shelf = Bookshelf::new(dir.path());
    let path = shelf
        .get_or_create("n1234ab", 1, || async move {
            build_episode_epub(
                "n1234ab",
                &fetched.novel_title,
                &fetched.episode,
                "2024-01-02T03:04:05+09:00",
                BuildOptions::default(),
            )
        })
        .await
        .expect("publish archive");

    assert_eq!(path, dir.path().join("n1234ab_1.epub"));

    let file = std::fs::File::open(&path).expect("open cached archive");
    let mut archive = zip::ZipArchive::new(file).expect("open zip");
    assert_eq!(archive.by_index(0).expect("entry 0").name(), "mimetype");

    let mut text = String::new();
    archive
        .by_name("src/text/1.xhtml")
        .expect("text entry")
        .read_to_string(&mut text)
        .expect("read text entry");
    assert!(text.contains("First paragraph of the stub episode."));
    assert!(text.contains("<span class=\"tcy\">25</span>"));

    let mut image = Vec::new();
    archive
        .by_name("src/image/i001.png")
        .expect("image entry")
        .read_to_end(&mut image)
        .expect("read image entry");
    assert_eq!(image, LOGO_PNG);

    // A second lookup is a pure cache hit; the stub server can be gone.
    drop(shutdown);
    server_thread.join().expect("join server thread");

    let again = shelf
        .get_or_create("n1234ab", 1, || async {
            panic!("producer must not run on a cache hit")
        })
        .await
        .expect("cache hit");
    assert_eq!(again, path);
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_failures_surface_as_fetch_errors() {
    let (base_url, shutdown, server_thread) = spawn_stub_narou();

    let client = NarouClient::new(&base_url, Duration::from_secs(5), true, true)
        .expect("build narou client");
    let err = client
        .fetch_episode("n9999zz", 1)
        .await
        .expect_err("missing novel should fail");
    assert!(matches!(err, novelshelf::error::Error::Fetch { .. }));

    drop(shutdown);
    server_thread.join().expect("join server thread");
}
