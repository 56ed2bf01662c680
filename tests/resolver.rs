//! End-to-end resolution against local mock services.
//!
//! The mock redirector and sync host speak plaintext WebSocket on loopback;
//! the catalog is an in-memory stub behind the `Catalog` trait.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{
    handshake::server::{Request, Response},
    Message,
};
use url::Url;

use ymnow::{
    catalog::Catalog,
    config::Config,
    error::{Error, Result},
    protocol::catalog::{Artist, Codec, DownloadInfo, Track},
    resolver::{FailureKind, NowPlaying, Resolver},
    token::Token,
};

fn token() -> Token {
    Token::new("y0_testtoken12345678").unwrap()
}

fn test_config(redirector: SocketAddr) -> Config {
    let mut config = Config::new();
    config.redirector_url = format!(
        "ws://{redirector}/redirector.YnisonRedirectService/GetRedirectToYnison"
    )
    .parse()
    .unwrap();
    config
}

/// Snapshot matching the canonical "one track playing" scenario.
const PLAYING_SNAPSHOT: &str = r#"{
    "player_state": {
        "player_queue": {
            "current_playable_index": 0,
            "entity_id": "playlist-1",
            "entity_type": "PLAYLIST",
            "playable_list": [{"playable_id": "777"}],
            "options": {"repeat_mode": "NONE"}
        },
        "status": {
            "paused": false,
            "duration_ms": 200000,
            "progress_ms": 15000
        }
    }
}"#;

/// Accepts a WebSocket connection, selecting a single sub-protocol from the
/// offered list the way a conforming service does.
async fn accept(stream: TcpStream) -> tokio_tungstenite::WebSocketStream<TcpStream> {
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    tokio_tungstenite::accept_hdr_async(stream, |request: &Request, mut response: Response| {
        if let Some(protocol) = request.headers().get("sec-websocket-protocol") {
            // The client offers a comma-separated list; a conforming server
            // echoes back exactly one of them, not the whole list.
            let selected = protocol
                .to_str()
                .unwrap_or_default()
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_owned();
            if let Ok(value) = HeaderValue::from_str(&selected) {
                response
                    .headers_mut()
                    .insert("sec-websocket-protocol", value);
            }
        }
        Ok(response)
    })
    .await
    .expect("websocket accept failed")
}

/// Spawns a redirector that answers every connection with `body` and then
/// drains until the client closes.
async fn spawn_redirector(body: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let mut ws = accept(stream).await;
                ws.send(Message::text(body)).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    addr
}

/// Spawns a sync host that checks the announcement is a passive shadow
/// state and replies with `snapshot`.
async fn spawn_sync_host(snapshot: String, shadow_announced: Arc<AtomicBool>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let snapshot = snapshot.clone();
            let shadow_announced = Arc::clone(&shadow_announced);
            tokio::spawn(async move {
                let mut ws = accept(stream).await;
                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Text(text) = message {
                        let value: serde_json::Value =
                            serde_json::from_str(text.as_str()).unwrap();
                        let full = &value["update_full_state"];
                        if full["device"]["is_shadow"] == true
                            && full["is_currently_active"] == false
                            && value["activity_interception_type"]
                                == "DO_NOT_INTERCEPT_BY_DEFAULT"
                        {
                            shadow_announced.store(true, Ordering::SeqCst);
                        }
                        ws.send(Message::text(snapshot.clone())).await.unwrap();
                    }
                }
            });
        }
    });

    addr
}

/// Spawns a listener that only counts connection attempts.
async fn spawn_connection_counter(connections: Arc<AtomicUsize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok(_stream) = listener.accept().await {
            connections.fetch_add(1, Ordering::SeqCst);
        }
    });

    addr
}

/// In-memory catalog with a configurable set of MP3 bitrates for every
/// track.
#[derive(Clone)]
struct StubCatalog {
    bitrates: Vec<u32>,
    unavailable: bool,
}

impl StubCatalog {
    fn with_bitrates(bitrates: &[u32]) -> Self {
        Self {
            bitrates: bitrates.to_vec(),
            unavailable: false,
        }
    }

    fn down() -> Self {
        Self {
            bitrates: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn download_info(
        &self,
        _token: &Token,
        _track_id: u64,
        prefer_high_quality: bool,
    ) -> Result<Vec<DownloadInfo>> {
        if self.unavailable {
            return Err(Error::unavailable("catalog is down"));
        }

        let mut bitrates = self.bitrates.clone();
        bitrates.sort_unstable();
        if prefer_high_quality {
            bitrates.reverse();
        }

        Ok(bitrates
            .into_iter()
            .map(|bitrate| DownloadInfo {
                codec: Codec::Mp3,
                bitrate_in_kbps: bitrate,
                download_info_url: "https://storage.example/info".parse().unwrap(),
                direct: false,
                preview: false,
            })
            .collect())
    }

    async fn direct_url(&self, _token: &Token, info: &DownloadInfo) -> Result<Url> {
        Ok(format!("https://storage.example/get-mp3/{}", info.bitrate_in_kbps)
            .parse()
            .unwrap())
    }

    async fn track(&self, _token: &Token, track_id: u64) -> Result<Track> {
        Ok(Track {
            id: track_id,
            title: "Song".to_owned(),
            artists: vec![Artist {
                id: 1,
                name: "Artist".to_owned(),
            }],
            duration_ms: 200_000,
            available: true,
        })
    }

    async fn search(&self, _token: &Token, _query: &str) -> Result<Vec<Track>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn resolves_currently_playing_track() {
    let shadow_announced = Arc::new(AtomicBool::new(false));
    let sync_addr =
        spawn_sync_host(PLAYING_SNAPSHOT.to_owned(), Arc::clone(&shadow_announced)).await;
    let redirector = spawn_redirector(format!(
        r#"{{"redirect_ticket":"ticket-abc","host":"{sync_addr}"}}"#
    ))
    .await;

    let resolver = Resolver::with_catalog(
        test_config(redirector),
        StubCatalog::with_bitrates(&[128, 192, 320]),
    );
    let outcome = resolver.now_playing(&token()).await;

    match outcome {
        NowPlaying::Playing {
            track,
            paused,
            progress,
            duration,
            entity_id,
            ..
        } => {
            assert_eq!(track.id, 777);
            assert_eq!(track.title, "Song");
            assert_eq!(track.artists, vec!["Artist".to_owned()]);
            assert_eq!(track.bitrate_kbps, 320);
            assert!(!paused);
            assert_eq!(progress, Duration::from_millis(15_000));
            assert_eq!(duration, Duration::from_millis(200_000));
            assert_eq!(entity_id, "playlist-1");
        }
        other => panic!("expected Playing, got {other:?}"),
    }

    // The join precondition was satisfied by a passive shadow device.
    assert!(shadow_announced.load(Ordering::SeqCst));
}

#[tokio::test]
async fn nothing_playing_is_not_an_error() {
    let snapshot = r#"{
        "player_state": {
            "player_queue": {"current_playable_index": -1, "playable_list": []},
            "status": {"paused": true, "duration_ms": 0, "progress_ms": 0}
        }
    }"#;
    let sync_addr =
        spawn_sync_host(snapshot.to_owned(), Arc::new(AtomicBool::new(false))).await;
    let redirector = spawn_redirector(format!(
        r#"{{"redirect_ticket":"ticket-abc","host":"{sync_addr}"}}"#
    ))
    .await;

    let resolver = Resolver::with_catalog(
        test_config(redirector),
        StubCatalog::with_bitrates(&[320]),
    );

    assert!(matches!(
        resolver.now_playing(&token()).await,
        NowPlaying::NotPlaying
    ));
}

#[tokio::test]
async fn malformed_redirect_opens_no_second_socket() {
    let connections = Arc::new(AtomicUsize::new(0));
    let sync_addr = spawn_connection_counter(Arc::clone(&connections)).await;

    // Well-formed JSON, but the ticket is missing.
    let redirector = spawn_redirector(format!(r#"{{"host":"{sync_addr}"}}"#)).await;

    let resolver = Resolver::with_catalog(
        test_config(redirector),
        StubCatalog::with_bitrates(&[320]),
    );
    let outcome = resolver.now_playing(&token()).await;

    match outcome {
        NowPlaying::Failed { kind, .. } => assert_eq!(kind, FailureKind::ProtocolViolation),
        other => panic!("expected Failed, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn out_of_bounds_index_is_a_protocol_violation() {
    let snapshot = r#"{
        "player_state": {
            "player_queue": {
                "current_playable_index": 5,
                "playable_list": [{"playable_id": "777"}]
            },
            "status": {}
        }
    }"#;
    let sync_addr =
        spawn_sync_host(snapshot.to_owned(), Arc::new(AtomicBool::new(false))).await;
    let redirector = spawn_redirector(format!(
        r#"{{"redirect_ticket":"ticket-abc","host":"{sync_addr}"}}"#
    ))
    .await;

    let resolver = Resolver::with_catalog(
        test_config(redirector),
        StubCatalog::with_bitrates(&[320]),
    );

    match resolver.now_playing(&token()).await {
        NowPlaying::Failed { kind, .. } => assert_eq!(kind, FailureKind::ProtocolViolation),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn falls_back_to_lower_bitrate() {
    let sync_addr = spawn_sync_host(
        PLAYING_SNAPSHOT.to_owned(),
        Arc::new(AtomicBool::new(false)),
    )
    .await;
    let redirector = spawn_redirector(format!(
        r#"{{"redirect_ticket":"ticket-abc","host":"{sync_addr}"}}"#
    ))
    .await;

    // No 320 kbps variant exists; the next-lower bitrate must win.
    let resolver = Resolver::with_catalog(
        test_config(redirector),
        StubCatalog::with_bitrates(&[128, 192]),
    );

    match resolver.now_playing(&token()).await {
        NowPlaying::Playing { track, .. } => assert_eq!(track.bitrate_kbps, 192),
        other => panic!("expected Playing, got {other:?}"),
    }
}

#[tokio::test]
async fn no_variant_at_any_quality_fails() {
    let sync_addr = spawn_sync_host(
        PLAYING_SNAPSHOT.to_owned(),
        Arc::new(AtomicBool::new(false)),
    )
    .await;
    let redirector = spawn_redirector(format!(
        r#"{{"redirect_ticket":"ticket-abc","host":"{sync_addr}"}}"#
    ))
    .await;

    let resolver =
        Resolver::with_catalog(test_config(redirector), StubCatalog::with_bitrates(&[]));

    match resolver.now_playing(&token()).await {
        NowPlaying::Failed { kind, .. } => assert_eq!(kind, FailureKind::NoPlayableVariant),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn catalog_outage_is_an_upstream_failure() {
    let sync_addr = spawn_sync_host(
        PLAYING_SNAPSHOT.to_owned(),
        Arc::new(AtomicBool::new(false)),
    )
    .await;
    let redirector = spawn_redirector(format!(
        r#"{{"redirect_ticket":"ticket-abc","host":"{sync_addr}"}}"#
    ))
    .await;

    let resolver = Resolver::with_catalog(test_config(redirector), StubCatalog::down());

    match resolver.now_playing(&token()).await {
        NowPlaying::Failed { kind, .. } => assert_eq!(kind, FailureKind::Upstream),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn unresponsive_redirector_times_out_within_its_bound() {
    // Accept the TCP connection but never complete the WebSocket handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let mut config = test_config(addr);
    config.connect_timeout = Duration::from_millis(200);
    config.negotiation_timeout = Duration::from_millis(400);

    let resolver = Resolver::with_catalog(config, StubCatalog::with_bitrates(&[320]));

    let started = Instant::now();
    let outcome = resolver.now_playing(&token()).await;
    let elapsed = started.elapsed();

    match outcome {
        NowPlaying::Failed { kind, .. } => assert_eq!(kind, FailureKind::Timeout),
        other => panic!("expected Failed, got {other:?}"),
    }
    // Bounded by the configured timeout, with generous margin for CI.
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}
