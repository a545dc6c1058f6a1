//! Auth-flow integration tests: interactive sign-in, token exchange,
//! session-store convergence and the password lifecycle. The exchange
//! backend is a canned in-process HTTP stub; the identity provider and
//! relational store are the in-memory implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use socialecho_core::config::EchoConfig;
use socialecho_core::identity::{
    AuthService, AuthState, IdentityProvider, MemoryIdentityProvider, SignUpRequest,
};
use socialecho_core::ledger::Settings;
use socialecho_core::storage::{
    MemoryStore, MemoryTokenVault, TokenVault, INTERNAL_JWT_KEY,
};

/// Serve every incoming request with the same canned status/body.
/// Returns the base URL.
async fn spawn_stub(status: u16, body: Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let payload = body.to_string();
            let status_line = match status {
                200 => "200 OK",
                400 => "400 Bad Request",
                401 => "401 Unauthorized",
                _ => "500 Internal Server Error",
            };
            tokio::spawn(async move {
                // Read headers, then exactly content-length body bytes.
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let header_end;
                loop {
                    let n = match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        header_end = pos + 4;
                        break;
                    }
                }
                let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < header_end + content_length {
                    let n = match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    buf.extend_from_slice(&chunk[..n]);
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                    payload.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

struct Harness {
    service: AuthService,
    provider: Arc<MemoryIdentityProvider>,
    vault: Arc<MemoryTokenVault>,
}

fn harness(backend: &str) -> Harness {
    let cfg = EchoConfig::new(backend, "http://localhost:8080", "unused.json").unwrap();
    let provider = Arc::new(MemoryIdentityProvider::new());
    let store = Arc::new(MemoryStore::new(Settings {
        free_credits_enabled: true,
        free_credit_amount: 50,
    }));
    let vault = Arc::new(MemoryTokenVault::new());
    let service =
        AuthService::new(&cfg, provider.clone(), store, vault.clone()).unwrap();
    Harness { service, provider, vault }
}

async fn register_user(provider: &MemoryIdentityProvider, email: &str, password: &str) -> Uuid {
    provider
        .sign_up(&SignUpRequest {
            email: email.into(),
            password: password.into(),
            metadata: json!({}),
            redirect_to: "http://localhost:8080/".into(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn interactive_sign_in_installs_session_and_stores_jwt() -> Result<()> {
    let uid = Uuid::new_v4();
    let backend = spawn_stub(
        200,
        json!({
            "supabase_session": {
                "access_token": format!("{uid}.a1"),
                "refresh_token": format!("{uid}.r1"),
            },
            "jwt": "internal-jwt-1",
        }),
    )
    .await;
    let h = harness(&backend);

    let session = h.service.sign_in("alice@example.com", "s3cr3t").await?;
    assert_eq!(session.user_id, uid);
    assert_eq!(h.service.sessions().state(), AuthState::Authenticated);
    assert_eq!(
        h.service.sessions().current().map(|s| s.user_id),
        Some(uid),
        "store must hold the signed-in user"
    );
    assert_eq!(
        h.vault.get(INTERNAL_JWT_KEY).await?.as_deref(),
        Some("internal-jwt-1"),
        "internal jwt must land in durable storage"
    );
    Ok(())
}

#[tokio::test]
async fn rejected_sign_in_surfaces_server_message_and_stays_anonymous() -> Result<()> {
    let backend = spawn_stub(401, json!({ "error": "Invalid credentials" })).await;
    let h = harness(&backend);
    h.service.init().await?;
    h.service.sessions().ready().await;

    let err = h.service.sign_in("alice@example.com", "wrong").await.unwrap_err();
    assert!(err.is_identity());
    assert_eq!(err.message(), "Invalid credentials", "server error passes through verbatim");
    assert_eq!(h.service.sessions().state(), AuthState::Anonymous);
    assert_eq!(h.vault.get(INTERNAL_JWT_KEY).await?, None, "no jwt stored on failure");
    Ok(())
}

#[tokio::test]
async fn token_exchange_installs_session_for_same_user() -> Result<()> {
    let uid = Uuid::new_v4();
    let backend = spawn_stub(
        200,
        json!({
            "supabase_session": {
                "access_token": format!("{uid}.a2"),
                "refresh_token": format!("{uid}.r2"),
            }
        }),
    )
    .await;
    let h = harness(&backend);

    let session = h.service.auto_sign_in("stored-internal-jwt").await?;
    assert_eq!(session.user_id, uid);
    assert_eq!(h.service.sessions().current().map(|s| s.user_id), Some(uid));
    Ok(())
}

#[tokio::test]
async fn invalid_internal_jwt_leaves_store_unchanged() -> Result<()> {
    let backend = spawn_stub(401, json!({ "error": "invalid or expired jwt" })).await;
    let h = harness(&backend);
    h.service.init().await?;
    h.service.sessions().ready().await;

    let err = h.service.auto_sign_in("bogus").await.unwrap_err();
    assert!(err.is_identity());
    assert_eq!(err.message(), "invalid or expired jwt");
    assert_eq!(h.service.sessions().state(), AuthState::Anonymous);
    assert_eq!(h.service.sessions().current(), None);
    Ok(())
}

#[tokio::test]
async fn transport_failure_maps_to_generic_network_error() -> Result<()> {
    // Grab a free port, then close it so the connection is refused.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let h = harness(&format!("http://{addr}"));
    let err = h.service.sign_in("alice@example.com", "pw").await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(err.message(), "network request failed", "transport detail must not leak");
    Ok(())
}

#[tokio::test]
async fn listener_and_fetch_converge_and_sign_out_clears() -> Result<()> {
    let h = harness("http://localhost:9");
    h.service.init().await?;
    h.service.sessions().ready().await;
    assert_eq!(h.service.sessions().state(), AuthState::Anonymous);

    let uid = register_user(&h.provider, "bob@example.com", "secret1").await;
    let mut rx = h.service.sessions().subscribe();
    // Provider-side sign-in reaches the store through the change listener.
    h.provider.sign_in_with_password("bob@example.com", "secret1").await?;
    tokio::time::timeout(Duration::from_secs(2), rx.changed()).await??;
    assert_eq!(h.service.sessions().current().map(|s| s.user_id), Some(uid));

    h.service.sign_out().await?;
    assert_eq!(h.service.sessions().state(), AuthState::Anonymous);
    h.service.shutdown();
    Ok(())
}

#[tokio::test]
async fn change_password_fails_closed_on_wrong_old_password() -> Result<()> {
    let h = harness("http://localhost:9");
    register_user(&h.provider, "carol@example.com", "original1").await;

    let err = h
        .service
        .passwords()
        .change_password("carol@example.com", "wrong-old", "brand-new-1")
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "old_password_incorrect");
    assert_eq!(err.message(), "Old password is incorrect.");

    // No update happened: the new password mints no session, the old one
    // still works.
    assert!(h
        .provider
        .sign_in_with_password("carol@example.com", "brand-new-1")
        .await
        .is_err());
    assert!(h
        .provider
        .sign_in_with_password("carol@example.com", "original1")
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn change_password_updates_and_may_replace_active_session() -> Result<()> {
    let h = harness("http://localhost:9");
    let uid = register_user(&h.provider, "dave@example.com", "original1").await;

    h.service
        .passwords()
        .change_password("dave@example.com", "original1", "updated-pw-1")
        .await?;

    // The verification sign-in replaced the active session for the same user.
    assert_eq!(h.service.sessions().current().map(|s| s.user_id), Some(uid));
    assert!(h
        .provider
        .sign_in_with_password("dave@example.com", "updated-pw-1")
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn forgot_password_is_uniform_and_embeds_reset_redirect() -> Result<()> {
    let h = harness("http://localhost:9");
    register_user(&h.provider, "erin@example.com", "secret1").await;

    // Known and unknown accounts produce the same visible result.
    h.service.passwords().forgot_password("erin@example.com").await?;
    h.service.passwords().forgot_password("ghost@example.com").await?;

    let requests = h.provider.reset_requests();
    assert_eq!(requests.len(), 2);
    for (_, redirect) in &requests {
        assert_eq!(redirect, "http://localhost:8080/reset-password");
    }
    Ok(())
}

#[tokio::test]
async fn reset_password_requires_recovery_session_and_length() -> Result<()> {
    let h = harness("http://localhost:9");
    let uid = register_user(&h.provider, "fay@example.com", "secret1").await;

    // No recovery session installed yet.
    let err = h.service.passwords().reset_password("fresh-pw-1").await.unwrap_err();
    assert_eq!(err.code_str(), "no_recovery_session");

    // Install the recovery session the landing page would build from the
    // URL-fragment tokens.
    let recovery = h
        .provider
        .set_session(&format!("{uid}.recovery"), &format!("{uid}.refresh"))
        .await?;
    h.service.sessions().apply(Some(recovery));

    let err = h.service.passwords().reset_password("short").await.unwrap_err();
    assert!(err.is_validation());

    h.service.passwords().reset_password("fresh-pw-1").await?;
    assert!(h.provider.sign_in_with_password("fay@example.com", "fresh-pw-1").await.is_ok());
    Ok(())
}
