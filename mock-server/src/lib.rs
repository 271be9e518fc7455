use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Contributor {
    pub login: String,
    pub contributions: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Repository {
    pub full_name: String,
    pub stargazers_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub total_count: usize,
    pub items: Vec<Repository>,
    /// The query pairs exactly as the server decoded them, in request order.
    pub query: Vec<(String, String)>,
}

/// What the echo routes saw on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/repos/{owner}/{repo}/contributors", get(contributors))
        .route("/search/repositories", get(search))
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/status/{code}", any(status))
        .route("/slow/{millis}", get(slow))
        .route("/malformed", get(malformed))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn known_contributors(owner: &str, repo: &str) -> Option<Vec<Contributor>> {
    let logins: &[(&str, u32)] = match (owner, repo) {
        ("square", "retrofit") => &[("JakeWharton", 1022), ("swankjesse", 256), ("pforhan", 48)],
        ("square", "okhttp") => &[("swankjesse", 1314), ("JakeWharton", 722)],
        _ => return None,
    };
    Some(
        logins
            .iter()
            .map(|(login, contributions)| Contributor {
                login: login.to_string(),
                contributions: *contributions,
            })
            .collect(),
    )
}

async fn contributors(Path((owner, repo)): Path<(String, String)>) -> Response {
    match known_contributors(&owner, &repo) {
        Some(list) => Json(list).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": "Not Found" })),
        )
            .into_response(),
    }
}

async fn search(Query(query): Query<Vec<(String, String)>>) -> Json<SearchResult> {
    let term = query
        .iter()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let items: Vec<Repository> = ["square/retrofit", "square/okhttp", "square/moshi"]
        .iter()
        .filter(|name| name.contains(&term))
        .map(|name| Repository {
            full_name: name.to_string(),
            stargazers_count: 40_000,
        })
        .collect();
    Json(SearchResult {
        total_count: items.len(),
        items,
        query,
    })
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        return status.into_response();
    }
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        format!(r#"{{"status":{code}}}"#),
    )
        .into_response()
}

async fn slow(Path(millis): Path<u64>) -> Json<String> {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    Json("done".to_string())
}

async fn malformed() -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        r#"[{"login": "JakeWharton", "contributions": "many"}]"#,
    )
        .into_response()
}
