//! Axum-based API gateway for the QuantumGuard demo dashboard.
//!
//! Every route is direct pass-through CRUD against the SQLite store plus, for
//! the knowledge query, one hosted chat-completion call. Handlers run a short
//! sequential chain of store calls and answer the shared
//! `{success: bool, ...}` / `{success: false, error}` envelope; any failure is
//! logged server-side and reported generically (400 for missing input, 500
//! otherwise).

mod handlers;
mod seed;
mod store;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Timelike;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path as StdPath;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quantumguard_core::{cipher, ChatBridge, CoreConfig, ALGORITHM_LABEL};
use store::{AuditAction, DashboardSqlite};

pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

const SEVEN_DAYS_MS: i64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Clone)]
pub(crate) struct AppState {
    config: Arc<CoreConfig>,
    store: Arc<DashboardSqlite>,
    bridge: Option<Arc<ChatBridge>>,
}

type JsonReply = (StatusCode, Json<Value>);

fn ok(value: Value) -> JsonReply {
    (StatusCode::OK, Json(value))
}

fn bad_request(message: &str) -> JsonReply {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message })),
    )
}

fn internal_error(message: &str) -> JsonReply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": message })),
    )
}

/// Caller address for audit rows: `x-forwarded-for`, then `x-real-ip`, else "unknown".
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

fn iso(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// UTC calendar day key for trend bucketing (`YYYY-MM-DD`).
fn day_key(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Mock cipher routes
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct EncryptRequest {
    #[serde(default)]
    payload: Option<String>,
}

/// POST /encrypt: mock AHE/HEE transform plus one encryption log and one audit row.
async fn encrypt_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EncryptRequest>,
) -> JsonReply {
    let Some(payload) = body.payload.filter(|p| !p.is_empty()) else {
        return bad_request("Payload is required");
    };

    let started = Instant::now();
    let encrypted = cipher::encrypt(&payload);
    let processing_time = started.elapsed().as_millis() as i64;

    let logged = state
        .store
        .insert_encryption_log(
            "encrypt",
            ALGORITHM_LABEL,
            payload.len() as i64,
            processing_time,
            true,
        )
        .and_then(|_| {
            state.store.insert_audit(
                AuditAction::EncryptData,
                "DataPayload",
                &format!("Encrypted {} bytes using AHE/HEE", payload.len()),
                &client_ip(&headers),
            )
        });
    if let Err(e) = logged {
        tracing::error!("encryption logging failed: {}", e);
        return internal_error("Failed to encrypt data");
    }

    ok(json!({
        "success": true,
        "encrypted": encrypted,
        "algorithm": ALGORITHM_LABEL,
        "processingTime": processing_time,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(serde::Deserialize)]
struct DecryptRequest {
    #[serde(default)]
    encrypted: Option<String>,
}

/// POST /decrypt: inverse transform; malformed payloads surface as a generic
/// decryption failure, never a panic.
async fn decrypt_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DecryptRequest>,
) -> JsonReply {
    let Some(encrypted) = body.encrypted.filter(|p| !p.is_empty()) else {
        return bad_request("Encrypted data is required");
    };

    let started = Instant::now();
    let decrypted = match cipher::decrypt(&encrypted) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("decryption failed: {}", e);
            return internal_error("Failed to decrypt data");
        }
    };
    let processing_time = started.elapsed().as_millis() as i64;

    let logged = state
        .store
        .insert_encryption_log(
            "decrypt",
            ALGORITHM_LABEL,
            decrypted.len() as i64,
            processing_time,
            true,
        )
        .and_then(|_| {
            state.store.insert_audit(
                AuditAction::DecryptData,
                "DataPayload",
                &format!("Decrypted {} bytes using AHE/HEE", decrypted.len()),
                &client_ip(&headers),
            )
        });
    if let Err(e) = logged {
        tracing::error!("decryption logging failed: {}", e);
        return internal_error("Failed to decrypt data");
    }

    ok(json!({
        "success": true,
        "decrypted": decrypted,
        "algorithm": ALGORITHM_LABEL,
        "processingTime": processing_time,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// Anomaly routes
// ---------------------------------------------------------------------------

/// GET /knowledge/anomalies: 100 most recent rows, newest first.
async fn anomalies_get(State(state): State<AppState>) -> JsonReply {
    match state.store.list_anomalies_recent(100) {
        Ok(rows) => ok(json!({
            "success": true,
            "anomalies": rows.iter().map(|a| json!({
                "id": a.id,
                "type": a.anomaly_type,
                "message": a.message,
                "source": a.source,
                "severity": a.severity,
                "resolved": a.resolved,
                "timestamp": iso(a.created_at_ms),
            })).collect::<Vec<_>>(),
        })),
        Err(e) => {
            tracing::error!("anomaly listing failed: {}", e);
            internal_error("Failed to fetch anomalies")
        }
    }
}

#[derive(serde::Deserialize)]
struct AnomalyRequest {
    #[serde(default, rename = "type")]
    anomaly_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    severity: Option<i64>,
}

/// POST /knowledge/anomalies: manual anomaly insertion with defaults
/// (`type=info`, `source=System`, `severity=0`). The type string is stored
/// as supplied; nothing validates it against the known set.
async fn anomalies_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnomalyRequest>,
) -> JsonReply {
    let Some(message) = body.message.filter(|m| !m.is_empty()) else {
        return bad_request("Message is required");
    };
    let anomaly_type = body.anomaly_type.as_deref().unwrap_or("info");
    let source = body.source.as_deref().unwrap_or("System");
    let severity = body.severity.unwrap_or(0);

    let created = state
        .store
        .insert_anomaly(anomaly_type, &message, source, severity)
        .and_then(|anomaly| {
            state.store.insert_audit(
                AuditAction::AnomalyReported,
                &format!("AnomalyLog:{}", anomaly.id),
                &format!("Reported {} anomaly from {}", anomaly.anomaly_type, anomaly.source),
                &client_ip(&headers),
            )?;
            Ok(anomaly)
        });

    match created {
        Ok(anomaly) => ok(json!({
            "success": true,
            "anomaly": {
                "id": anomaly.id,
                "type": anomaly.anomaly_type,
                "message": anomaly.message,
                "source": anomaly.source,
                "timestamp": iso(anomaly.created_at_ms),
            },
        })),
        Err(e) => {
            tracing::error!("anomaly creation failed: {}", e);
            internal_error("Failed to create anomaly")
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge ingestion + query routes
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct IngestRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    entry_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: Option<String>,
    #[serde(default, rename = "uploadedBy")]
    uploaded_by: Option<String>,
}

/// POST /knowledge/ingest: creates the entry in `processing` and promotes it
/// to `indexed` in the same store transaction. There is no real indexing
/// pipeline; the transition is synchronous by design.
async fn ingest_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<IngestRequest>,
) -> JsonReply {
    let (Some(title), Some(raw_type)) = (
        body.title.filter(|t| !t.is_empty()),
        body.entry_type.filter(|t| !t.is_empty()),
    ) else {
        return bad_request("Title and type are required");
    };

    let created = state
        .store
        .insert_entry(
            &title,
            &raw_type.to_uppercase(),
            body.content.as_deref(),
            body.metadata.as_deref(),
            body.uploaded_by.as_deref(),
        )
        .and_then(|entry| {
            state.store.insert_audit(
                AuditAction::KnowledgeIngest,
                &format!("KnowledgeEntry:{}", entry.id),
                &format!("Ingested {} file: {}", raw_type, title),
                &client_ip(&headers),
            )?;
            Ok(entry)
        });

    match created {
        Ok(entry) => ok(json!({
            "success": true,
            "entry": {
                "id": entry.id,
                "title": entry.title,
                "type": entry.entry_type,
                "status": entry.status,
                "createdAt": iso(entry.created_at_ms),
            },
        })),
        Err(e) => {
            tracing::error!("knowledge ingestion failed: {}", e);
            internal_error("Failed to ingest knowledge")
        }
    }
}

/// GET /knowledge/ingest: 50 most recent entries.
async fn ingest_get(State(state): State<AppState>) -> JsonReply {
    match state.store.list_entries_recent(50) {
        Ok(rows) => ok(json!({
            "success": true,
            "entries": rows.iter().map(|e| json!({
                "id": e.id,
                "title": e.title,
                "type": e.entry_type,
                "status": e.status,
                "createdAt": iso(e.created_at_ms),
            })).collect::<Vec<_>>(),
        })),
        Err(e) => {
            tracing::error!("knowledge listing failed: {}", e);
            internal_error("Failed to fetch knowledge entries")
        }
    }
}

#[derive(serde::Deserialize)]
struct KnowledgeQueryParams {
    #[serde(default)]
    q: Option<String>,
}

/// GET /knowledge/query?q=: up to 10 indexed entries as prompt context, one
/// chat-completion round trip, one query log row. The confidence score is
/// synthetic (85–95 with context, 70–80 without), not a similarity metric.
async fn knowledge_query_get(
    State(state): State<AppState>,
    Query(params): Query<KnowledgeQueryParams>,
) -> JsonReply {
    let Some(query) = params.q.filter(|q| !q.trim().is_empty()) else {
        return bad_request("Query parameter is required");
    };

    let entries = match state.store.list_indexed_entries(10) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("knowledge fetch for query failed: {}", e);
            return internal_error("Failed to process query");
        }
    };

    let started = Instant::now();
    let response_text = if state.config.llm_mode == "mock" {
        handlers::query::mock_response(&query, entries.len())
    } else {
        let Some(bridge) = state.bridge.as_ref() else {
            tracing::error!("llm_mode is live but no API key is configured");
            return internal_error("Failed to process query");
        };
        let user_prompt = handlers::query::build_user_prompt(&entries, &query);
        match bridge.complete(handlers::query::SYSTEM_PROMPT, &user_prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("chat-completion call failed: {}", e);
                return internal_error("Failed to process query");
            }
        }
    };
    let processing_time = started.elapsed().as_millis() as i64;

    let base: f64 = if entries.is_empty() { 70.0 } else { 85.0 };
    let confidence = (base + rand::thread_rng().gen_range(0.0..10.0)).round() as i64;

    if let Err(e) = state.store.insert_query_log(
        &query,
        &response_text,
        confidence,
        entries.len() as i64,
        processing_time,
    ) {
        tracing::error!("query logging failed: {}", e);
        return internal_error("Failed to process query");
    }

    ok(json!({
        "success": true,
        "response": response_text,
        "confidence": confidence,
        "resultCount": entries.len(),
        "processingTime": processing_time,
    }))
}

// ---------------------------------------------------------------------------
// Dashboard aggregation routes
// ---------------------------------------------------------------------------

/// Epoch millis of the most recent local midnight ("queries today" cutoff).
fn local_midnight_ms() -> i64 {
    let now = chrono::Local::now();
    now.timestamp_millis()
        - i64::from(now.num_seconds_from_midnight()) * 1000
        - i64::from(now.timestamp_subsec_millis())
}

fn overview_payload(store: &DashboardSqlite) -> Result<Value, rusqlite::Error> {
    let knowledge_count = store.count_indexed_entries()?;
    let active_anomalies = store.count_unresolved_anomalies()?;
    let queries_today = store.count_queries_since(local_midnight_ms())?;
    let recent_anomalies = store.list_unresolved_anomalies(10)?;
    let recent_entries = store.list_entries_recent(5)?;
    let encryption_count = store.count_encrypt_operations()?;
    let avg_encryption_time = store.avg_encrypt_time_ms()?.unwrap_or(0.0).round() as i64;

    Ok(json!({
        "success": true,
        "metrics": {
            "knowledgeEntries": knowledge_count,
            "activeAnomalies": active_anomalies,
            "queriesToday": queries_today,
            "encryptionStatus": "Active",
            "encryptionOperations": encryption_count,
            "avgEncryptionTime": avg_encryption_time,
        },
        "recentAnomalies": recent_anomalies.iter().map(|a| json!({
            "id": a.id,
            "type": a.anomaly_type,
            "message": a.message,
            "source": a.source,
            "timestamp": iso(a.created_at_ms),
        })).collect::<Vec<_>>(),
        "recentEntries": recent_entries.iter().map(|e| json!({
            "id": e.id,
            "title": e.title,
            "type": e.entry_type,
            "status": e.status,
            "timestamp": iso(e.created_at_ms),
        })).collect::<Vec<_>>(),
    }))
}

/// GET /dashboard/overview: counts and recency lists for the landing page.
/// Every poll re-runs the aggregation; nothing is cached.
async fn dashboard_overview_get(State(state): State<AppState>) -> JsonReply {
    match overview_payload(&state.store) {
        Ok(payload) => ok(payload),
        Err(e) => {
            tracing::error!("dashboard overview failed: {}", e);
            internal_error("Failed to fetch dashboard data")
        }
    }
}

fn anomaly_color(anomaly_type: &str) -> &'static str {
    match anomaly_type {
        "critical" => "#ef4444",
        "warning" => "#f59e0b",
        _ => "#3b82f6",
    }
}

fn anomaly_ordinal(anomaly_type: &str) -> i64 {
    match anomaly_type {
        "critical" => 3,
        "warning" => 2,
        _ => 1,
    }
}

fn visual_payload(store: &DashboardSqlite) -> Result<Value, rusqlite::Error> {
    let anomaly_groups = store.unresolved_anomaly_counts_by_type()?;
    let knowledge_groups = store.entry_counts_by_type()?;

    let since = store::now_ms() - SEVEN_DAYS_MS;

    let mut queries_by_day: BTreeMap<String, i64> = BTreeMap::new();
    for ts in store.query_timestamps_since(since)? {
        *queries_by_day.entry(day_key(ts)).or_insert(0) += 1;
    }

    let mut encryption_by_day: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for (operation, ts) in store.encryption_ops_since(since)? {
        let bucket = encryption_by_day.entry(day_key(ts)).or_insert((0, 0));
        match operation.as_str() {
            "encrypt" => bucket.0 += 1,
            "decrypt" => bucket.1 += 1,
            _ => {}
        }
    }

    let scatter = store.anomaly_scatter(50)?;

    Ok(json!({
        "success": true,
        "data": {
            "anomalies": anomaly_groups.iter().map(|(t, count)| json!({
                "type": t,
                "count": count,
                "color": anomaly_color(t),
            })).collect::<Vec<_>>(),
            "knowledge": knowledge_groups.iter().map(|(t, count)| json!({
                "type": t,
                "count": count,
                "color": "#8b5cf6",
            })).collect::<Vec<_>>(),
            "queryTrends": queries_by_day.iter().map(|(date, count)| json!({
                "date": date,
                "count": count,
            })).collect::<Vec<_>>(),
            "encryptionTrends": encryption_by_day.iter().map(|(date, (enc, dec))| json!({
                "date": date,
                "encrypt": enc,
                "decrypt": dec,
            })).collect::<Vec<_>>(),
            "anomalyScatter": scatter.iter().map(|(id, t, severity, ts)| json!({
                "x": severity,
                "y": ts,
                "z": anomaly_ordinal(t),
                "type": t,
                "id": id,
            })).collect::<Vec<_>>(),
        },
    }))
}

/// GET /dashboard/3d-visual: group-bys, 7-day UTC day buckets, and the
/// capped 50-row severity/time/ordinal scatter projection.
async fn dashboard_visual_get(State(state): State<AppState>) -> JsonReply {
    match visual_payload(&state.store) {
        Ok(payload) => ok(payload),
        Err(e) => {
            tracing::error!("3d visual data failed: {}", e);
            internal_error("Failed to fetch visualization data")
        }
    }
}

// ---------------------------------------------------------------------------
// User + audit routes
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct UserPatchRequest {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// PATCH /user/:id: patches only the supplied fields. No authorization check
/// exists anywhere in this demo; any caller may alter any user.
async fn user_patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UserPatchRequest>,
) -> JsonReply {
    let updated = match state
        .store
        .update_user(&id, body.role.as_deref(), body.status.as_deref())
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::error!("user update failed: no user with id {}", id);
            return internal_error("Failed to update user");
        }
        Err(e) => {
            tracing::error!("user update failed: {}", e);
            return internal_error("Failed to update user");
        }
    };

    let mut changes: Vec<String> = Vec::new();
    if let Some(role) = body.role.as_deref() {
        changes.push(format!("role={}", role));
    }
    if let Some(status) = body.status.as_deref() {
        changes.push(format!("status={}", status));
    }
    let audit = state.store.insert_audit(
        AuditAction::UserUpdated,
        &format!("User:{}", updated.id),
        &format!("Updated user {}: {}", updated.email, changes.join(" ")),
        &client_ip(&headers),
    );
    if let Err(e) = audit {
        tracing::error!("user update audit failed: {}", e);
        return internal_error("Failed to update user");
    }

    ok(json!({
        "success": true,
        "user": {
            "id": updated.id,
            "email": updated.email,
            "name": updated.name,
            "role": updated.role,
            "status": updated.status,
            "updatedAt": iso(updated.updated_at_ms),
        },
    }))
}

#[derive(serde::Deserialize)]
struct AuditLogsParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

/// GET /audit/logs?limit=&offset=: paginated read, newest first, plus total.
async fn audit_logs_get(
    State(state): State<AppState>,
    Query(params): Query<AuditLogsParams>,
) -> JsonReply {
    let limit = params.limit.unwrap_or(100);
    let offset = params.offset.unwrap_or(0);

    let result = state
        .store
        .list_audit_logs(limit, offset)
        .and_then(|rows| Ok((rows, state.store.count_audit_logs()?)));

    match result {
        Ok((rows, total)) => ok(json!({
            "success": true,
            "logs": rows.iter().map(|log| json!({
                "id": log.id,
                "action": log.action,
                "resource": log.resource,
                "details": log.details,
                "ipAddress": log.ip_address,
                "timestamp": iso(log.created_at_ms),
            })).collect::<Vec<_>>(),
            "total": total,
            "limit": limit,
            "offset": offset,
        })),
        Err(e) => {
            tracing::error!("audit log listing failed: {}", e);
            internal_error("Failed to fetch audit logs")
        }
    }
}

/// GET /health: liveness probe for the frontend.
async fn health(State(state): State<AppState>) -> JsonReply {
    ok(json!({
        "status": "ok",
        "app_name": state.config.app_name,
        "version": GATEWAY_VERSION,
    }))
}

// ---------------------------------------------------------------------------
// App wiring
// ---------------------------------------------------------------------------

fn frontend_root_dir() -> std::path::PathBuf {
    // Prefer a working-directory-relative path (run from workspace root).
    // Fall back to `CARGO_MANIFEST_DIR/../../frontend` for safety.
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let from_cwd = cwd.join("frontend");
    if from_cwd.exists() {
        return from_cwd;
    }
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("frontend")
}

fn build_app(state: AppState) -> Router {
    let frontend_enabled = state.config.frontend_enabled;

    // CORS: allow local dev UI origins only.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &axum::http::HeaderValue, _| {
            let s = origin.to_str().unwrap_or("");
            let port = s
                .split(':')
                .last()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(0);
            (3000..=3099).contains(&port) || (8000..=8099).contains(&port)
        }))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/encrypt", post(encrypt_post))
        .route("/decrypt", post(decrypt_post))
        .route("/knowledge/anomalies", get(anomalies_get).post(anomalies_post))
        .route("/knowledge/ingest", get(ingest_get).post(ingest_post))
        .route("/knowledge/query", get(knowledge_query_get))
        .route("/dashboard/overview", get(dashboard_overview_get))
        .route("/dashboard/3d-visual", get(dashboard_visual_get))
        .route("/user/:id", patch(user_patch))
        .route("/audit/logs", get(audit_logs_get))
        .with_state(state);

    if frontend_enabled {
        let frontend_dir = frontend_root_dir();
        let index_file = frontend_dir.join("index.html");

        app = app.route_service("/", ServeFile::new(index_file));
        app = app.nest_service("/ui", ServeDir::new(frontend_dir));
    }

    app.layer(cors)
}

/// Pre-flight check: store tables are accessible and the port is free.
fn run_verify() -> Result<(), String> {
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;
    let db_path = StdPath::new(&config.storage_path).join("quantumguard.sqlite");

    print!("Checking store at {}... ", db_path.display());
    let store =
        DashboardSqlite::new(db_path).map_err(|e| format!("store inaccessible: {}", e))?;
    store
        .count_audit_logs()
        .and_then(|_| store.count_indexed_entries())
        .and_then(|_| store.count_unresolved_anomalies())
        .and_then(|_| store.count_encrypt_operations())
        .map_err(|e| format!("table probe failed: {}", e))?;
    println!("OK");

    print!("Checking port {}... ", config.port);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => {
            return Err(format!("Port {} BLOCKED: {}", config.port, e));
        }
    }

    println!("\nSUCCESS: All systems GO. Ready to start gateway.");
    Ok(())
}

fn run_seed() -> Result<(), String> {
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;
    let db_path = StdPath::new(&config.storage_path).join("quantumguard.sqlite");
    let store =
        DashboardSqlite::new(db_path).map_err(|e| format!("store inaccessible: {}", e))?;
    seed::seed_demo_data(&store).map_err(|e| format!("seed failed: {}", e))?;
    println!("Demo data seeded into {}", store.path().display());
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env first; the chat-completion API key stays in the backend only.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[quantumguard-gateway] .env not loaded: {} (using system environment)", e);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verify") {
        match run_verify() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }
    if args.iter().any(|a| a == "--seed") {
        match run_seed() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("SEED FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(CoreConfig::load().expect("load CoreConfig"));
    let db_path = StdPath::new(&config.storage_path).join("quantumguard.sqlite");
    let store = Arc::new(DashboardSqlite::new(db_path).expect("open dashboard store"));

    let bridge = ChatBridge::from_env().map(Arc::new);
    if config.llm_mode == "live" && bridge.is_none() {
        tracing::warn!(
            "llm_mode is \"live\" but neither ZAI_API_KEY nor OPENROUTER_API_KEY is set; knowledge queries will fail"
        );
    }

    let state = AppState {
        config: Arc::clone(&config),
        store,
        bridge,
    };
    let app = build_app(state);

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("{} listening on {}", config.app_name, addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind gateway port");
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown initiated (Ctrl+C received)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use base64::{engine::general_purpose, Engine as _};
    use tower::ServiceExt;

    fn test_state(llm_mode: &str) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DashboardSqlite::new(dir.path().join("gateway.sqlite")).expect("open store");
        let state = AppState {
            config: Arc::new(CoreConfig {
                app_name: "Test Gateway".to_string(),
                port: 8000,
                storage_path: dir.path().to_string_lossy().to_string(),
                llm_mode: llm_mode.to_string(),
                frontend_enabled: false,
            }),
            store: Arc::new(store),
            bridge: None,
        };
        (state, dir)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn encrypt_hello_matches_wire_format() {
        let (state, _dir) = test_state("mock");
        let app = build_app(state);

        let res = app
            .oneshot(json_request("POST", "/encrypt", json!({ "payload": "hello" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["algorithm"], "AHE-HEE");

        let encrypted = body["encrypted"].as_str().unwrap();
        let (encoded, timestamp) = encrypted.split_once("::QUANTUM_AHE_HEE::").unwrap();
        assert_eq!(encoded, general_purpose::STANDARD.encode("olleh"));
        assert!(timestamp.parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_round_trips() {
        let (state, _dir) = test_state("mock");
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(json_request("POST", "/encrypt", json!({ "payload": "héllo wörld" })))
            .await
            .unwrap();
        let encrypted = json_body(res).await["encrypted"].as_str().unwrap().to_string();

        let res = app
            .oneshot(json_request("POST", "/decrypt", json!({ "encrypted": encrypted })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["decrypted"], "héllo wörld");
    }

    #[tokio::test]
    async fn encrypt_without_payload_is_rejected() {
        let (state, _dir) = test_state("mock");
        let app = build_app(state);

        let res = app
            .oneshot(json_request("POST", "/encrypt", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Payload is required");
    }

    #[tokio::test]
    async fn decrypt_without_delimiter_fails_gracefully() {
        let (state, _dir) = test_state("mock");
        let app = build_app(state);

        let res = app
            .oneshot(json_request("POST", "/decrypt", json!({ "encrypted": "bm90IHZhbGlk" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to decrypt data");
    }

    #[tokio::test]
    async fn anomaly_defaults_apply_when_fields_omitted() {
        let (state, _dir) = test_state("mock");
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/knowledge/anomalies",
                json!({ "message": "strange spike" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["anomaly"]["type"], "info");
        assert_eq!(body["anomaly"]["source"], "System");

        let res = app.oneshot(get_request("/knowledge/anomalies")).await.unwrap();
        let body = json_body(res).await;
        let anomalies = body["anomalies"].as_array().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0]["severity"], 0);
        assert_eq!(anomalies[0]["resolved"], false);
    }

    #[tokio::test]
    async fn ingested_entry_comes_back_indexed() {
        let (state, _dir) = test_state("mock");
        let store = Arc::clone(&state.store);
        let app = build_app(state);

        let res = app
            .oneshot(json_request(
                "POST",
                "/knowledge/ingest",
                json!({ "title": "Guidelines.txt", "type": "txt", "content": "rules" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["entry"]["status"], "indexed");
        assert_eq!(body["entry"]["type"], "TXT");

        let id = body["entry"]["id"].as_str().unwrap();
        let entry = store.get_entry(id).unwrap().unwrap();
        assert_eq!(entry.status, "indexed");
    }

    #[tokio::test]
    async fn query_in_mock_mode_logs_and_scores() {
        let (state, _dir) = test_state("mock");
        let store = Arc::clone(&state.store);
        store
            .insert_entry("Policies.pdf", "PDF", Some("policy text"), None, None)
            .unwrap();
        let app = build_app(state);

        let res = app
            .oneshot(get_request("/knowledge/query?q=what%20are%20the%20policies"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["resultCount"], 1);
        let confidence = body["confidence"].as_i64().unwrap();
        assert!((85..=95).contains(&confidence), "confidence {} out of range", confidence);
        assert_eq!(store.count_queries_since(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn query_without_q_is_rejected() {
        let (state, _dir) = test_state("mock");
        let app = build_app(state);

        let res = app.oneshot(get_request("/knowledge/query")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "Query parameter is required");
    }

    #[tokio::test]
    async fn user_patch_with_status_only_keeps_role() {
        let (state, _dir) = test_state("mock");
        let user = state
            .store
            .upsert_user("analyst@quantumguard.com", "Security Analyst", "analyst", "active")
            .unwrap();
        let app = build_app(state);

        let res = app
            .oneshot(json_request(
                "PATCH",
                &format!("/user/{}", user.id),
                json!({ "status": "suspended" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["user"]["role"], "analyst");
        assert_eq!(body["user"]["status"], "suspended");
    }

    #[tokio::test]
    async fn user_patch_on_unknown_id_reports_generic_failure() {
        let (state, _dir) = test_state("mock");
        let app = build_app(state);

        let res = app
            .oneshot(json_request("PATCH", "/user/nope", json!({ "role": "admin" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(res).await["error"], "Failed to update user");
    }

    #[tokio::test]
    async fn audit_logs_paginate_newest_first_with_total() {
        let (state, _dir) = test_state("mock");
        for i in 0..3 {
            state
                .store
                .insert_audit(AuditAction::EncryptData, "DataPayload", &format!("op {}", i), "unknown")
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let app = build_app(state);

        let res = app
            .oneshot(get_request("/audit/logs?limit=2&offset=0"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let logs = body["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["details"], "op 2");
        assert_eq!(logs[1]["details"], "op 1");
        assert_eq!(body["total"], 3);
        assert_eq!(body["limit"], 2);
        assert_eq!(body["offset"], 0);
    }

    #[tokio::test]
    async fn overview_counts_encrypt_operations_only() {
        let (state, _dir) = test_state("mock");
        state.store.insert_encryption_log("encrypt", ALGORITHM_LABEL, 100, 3, true).unwrap();
        state.store.insert_encryption_log("encrypt", ALGORITHM_LABEL, 200, 5, true).unwrap();
        state.store.insert_encryption_log("decrypt", ALGORITHM_LABEL, 100, 2, true).unwrap();
        state.store.insert_anomaly("critical", "boom", "Auth Gateway", 9).unwrap();
        let app = build_app(state);

        let res = app.oneshot(get_request("/dashboard/overview")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["metrics"]["encryptionOperations"], 2);
        assert_eq!(body["metrics"]["avgEncryptionTime"], 4);
        assert_eq!(body["metrics"]["activeAnomalies"], 1);
        assert_eq!(body["metrics"]["encryptionStatus"], "Active");
    }

    #[tokio::test]
    async fn visual_payload_has_trends_and_scatter() {
        let (state, _dir) = test_state("mock");
        state.store.insert_anomaly("critical", "a", "Auth Gateway", 9).unwrap();
        state.store.insert_anomaly("warning", "b", "Query Engine", 5).unwrap();
        state.store.insert_query_log("q", "r", 90, 1, 10).unwrap();
        state.store.insert_encryption_log("encrypt", ALGORITHM_LABEL, 64, 2, true).unwrap();
        let app = build_app(state);

        let res = app.oneshot(get_request("/dashboard/3d-visual")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let data = &body["data"];
        assert_eq!(data["anomalies"].as_array().unwrap().len(), 2);
        assert_eq!(data["queryTrends"].as_array().unwrap().len(), 1);
        assert_eq!(data["encryptionTrends"][0]["encrypt"], 1);

        let scatter = data["anomalyScatter"].as_array().unwrap();
        assert_eq!(scatter.len(), 2);
        let critical = scatter.iter().find(|p| p["type"] == "critical").unwrap();
        assert_eq!(critical["x"], 9);
        assert_eq!(critical["z"], 3);
    }
}
