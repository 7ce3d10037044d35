use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::StatusCode;
use hyper::header::{ALLOW, CONTENT_TYPE, RETRY_AFTER};

use super::tls::{client_config, parse_certificates};
use super::{ServerTls, TlsError, queue_path, render, topic_from_path};
use crate::auth::{Authenticator, IdentityStore};
use crate::broker::Reply;
use crate::test_support::{generate_ca, generate_client, generate_server, identity, topic};

const TOPIC: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

fn server_tls() -> (ServerTls, crate::test_support::TestCa) {
    let ca = generate_ca("Skullsup Test Root");
    let server = generate_server(&ca);
    let tls = ServerTls::from_pem(
        server.cert.pem().as_bytes(),
        server.key.serialize_pem().as_bytes(),
        ca.cert.pem().as_bytes(),
    )
    .expect("server tls");
    (tls, ca)
}

#[test]
fn test_queue_path_round_trip() {
    let path = queue_path(TOPIC);
    assert_eq!(path, format!("/hell/{TOPIC}"));
    assert_eq!(topic_from_path(&path), Some(TOPIC));
}

#[test]
fn test_topic_from_path_rejects_other_routes() {
    assert_eq!(topic_from_path("/"), None);
    assert_eq!(topic_from_path("/hell"), None);
    assert_eq!(topic_from_path("/heaven/abc"), None);
    assert_eq!(topic_from_path("hell/abc"), None);
    assert_eq!(topic_from_path("/hellfire/abc"), None);
    // Topic validation is the dispatcher's job.
    assert_eq!(topic_from_path("/hell/"), Some(""));
    assert_eq!(topic_from_path("/hell/a/b"), Some("a/b"));
}

#[tokio::test]
async fn test_render_success_replies() {
    let accepted = render(Reply::Accepted);
    assert_eq!(accepted.status(), StatusCode::OK);
    let body = accepted.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());

    let delivered = render(Reply::Delivered(br#"{"cmd":"color"}"#.to_vec()));
    assert_eq!(delivered.status(), StatusCode::OK);
    assert_eq!(delivered.headers()[CONTENT_TYPE], "application/json");
    let body = delivered.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], br#"{"cmd":"color"}"#);
}

#[tokio::test]
async fn test_render_error_replies() {
    let forbidden = render(Reply::Forbidden);
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    let body = forbidden.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"forbidden");

    let malformed = render(Reply::Malformed("missing cmd".to_string()));
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let body = malformed.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"missing cmd");

    assert_eq!(render(Reply::TooLarge).status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        render(Reply::Internal).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );

    let method = render(Reply::MethodNotAllowed);
    assert_eq!(method.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(method.headers()[ALLOW], "GET, PUT");
}

#[test]
fn test_render_capacity_replies() {
    let full = render(Reply::Full);
    assert_eq!(full.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(!full.status().is_server_error());
    assert_eq!(full.headers()[RETRY_AFTER], "5");

    let empty = render(Reply::Empty);
    assert_eq!(empty.status(), StatusCode::NO_CONTENT);
    assert_eq!(empty.headers()[RETRY_AFTER], "5");
}

#[test]
fn test_server_tls_rejects_missing_material() {
    let ca = generate_ca("Skullsup Test Root");
    let server = generate_server(&ca);
    let cert = server.cert.pem();
    let key = server.key.serialize_pem();

    assert!(matches!(
        ServerTls::from_pem(cert.as_bytes(), key.as_bytes(), b""),
        Err(TlsError::Empty(_))
    ));
    assert!(matches!(
        ServerTls::from_pem(b"", key.as_bytes(), ca.cert.pem().as_bytes()),
        Err(TlsError::Empty(_))
    ));
    assert!(matches!(
        ServerTls::from_pem(cert.as_bytes(), b"", ca.cert.pem().as_bytes()),
        Err(TlsError::PrivateKey(_))
    ));
}

#[test]
fn test_verified_chains_appends_issuing_root() {
    let (tls, ca) = server_tls();
    let leaf = generate_client(&ca, "consumer", &[0x0a, 0x1b]);
    let presented = vec![leaf.cert.der().clone()];

    let chains = tls.verified_chains(&presented);
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].len(), 2);
    assert_eq!(chains[0][0], *leaf.cert.der());
    assert_eq!(chains[0][1], *ca.cert.der());
}

#[test]
fn test_verified_chains_with_bundled_ca_resolves_identity() {
    let (tls, ca) = server_tls();
    let leaf = generate_client(&ca, "consumer", &[0x0a, 0x1b]);
    let presented = vec![leaf.cert.der().clone(), ca.cert.der().clone()];

    let chains = tls.verified_chains(&presented);
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0], vec![leaf.cert.der().clone(), ca.cert.der().clone()]);

    let mailbox = topic("7c9e6679-7425-40de-944b-e07fc1f90ae7");
    let store = IdentityStore::new([identity("consumer", "0a1b", &[&mailbox], &[])], [])
        .expect("identity store");
    let auth = Authenticator::new(Arc::new(store));
    assert_eq!(auth.authenticate(&chains).expect("authenticated").name(), "consumer");
}

#[test]
fn test_verified_chains_ignores_foreign_issuer() {
    let (tls, _ca) = server_tls();
    let other = generate_ca("Someone Else");
    let leaf = generate_client(&other, "consumer", &[0x0a, 0x1b]);

    assert!(tls.verified_chains(&[leaf.cert.der().clone()]).is_empty());
    assert!(tls.verified_chains(&[]).is_empty());
}

#[test]
fn test_client_config_builds_from_pem() {
    let ca = generate_ca("Skullsup Test Root");
    let leaf = generate_client(&ca, "producer", &[0x01]);
    let ca_pem = ca.cert.pem();

    assert_eq!(parse_certificates(ca_pem.as_bytes()).unwrap().len(), 1);
    assert!(
        client_config(
            ca_pem.as_bytes(),
            leaf.cert.pem().as_bytes(),
            leaf.key.serialize_pem().as_bytes(),
        )
        .is_ok()
    );
    assert!(matches!(
        client_config(b"", leaf.cert.pem().as_bytes(), leaf.key.serialize_pem().as_bytes()),
        Err(TlsError::Empty(_))
    ));
}
