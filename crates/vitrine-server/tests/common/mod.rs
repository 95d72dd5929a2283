//! Shared harness for the HTTP integration tests: an ephemeral server
//! wired to a wiremock upstream, plus a credential signer that produces
//! real signed init data blobs.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use vitrine_server::{build_app, AppConfig, AppState};
use vitrine_store::{HttpRecordStore, RecordStore, StoreConfig};

pub const BOT_TOKEN: &str = "123456:TEST-token";
pub const ADMIN_KEY: &str = "test-admin-key";

pub fn test_config(store_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.store.url = store_url.to_string();
    config.store.timeout_secs = 5;
    config.auth.bot_token = Some(BOT_TOKEN.to_string());
    config.auth.admin_api_key = Some(ADMIN_KEY.to_string());
    config
}

pub async fn start_server(
    config: AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let store = HttpRecordStore::new(&StoreConfig {
        base_url: config.store.url.clone(),
        token: config.store.token.clone(),
        timeout: config.store.timeout(),
    })
    .expect("store client");
    let state = AppState::new(config, Arc::new(store) as Arc<dyn RecordStore>);
    let app = build_app(state);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = rx.await;
        })
        .await;
    });

    (format!("http://{addr}"), tx, server)
}

/// A correctly signed init data blob for the given user, issued now.
pub fn signed_init_data(user_id: i64) -> String {
    let auth_date = time::OffsetDateTime::now_utc().unix_timestamp();
    let user = format!(
        r#"{{"id":{user_id},"first_name":"Jane","last_name":"Doe","username":"jane"}}"#
    );
    let fields: Vec<(&str, String)> = vec![
        ("auth_date", auth_date.to_string()),
        ("query_id", "AAA111".to_string()),
        ("user", user),
    ];

    // Check string: keys sorted, key=value lines joined with \n.
    let mut sorted = fields.clone();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let check_string = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let signing_key = Sha256::digest(BOT_TOKEN.as_bytes());
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key.as_slice()).unwrap();
    mac.update(check_string.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &fields {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

/// The same blob with the signature's last hex digit flipped.
pub fn tampered_init_data(user_id: i64) -> String {
    let blob = signed_init_data(user_id);
    let mut chars: Vec<char> = blob.chars().collect();
    let last = chars.last_mut().unwrap();
    *last = if *last == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}
