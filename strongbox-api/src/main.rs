//! Strongbox API Server
//!
//! HTTP interface to the envelope-encrypted secret store.
//!
//! Configuration (environment variables):
//!   STRONGBOX_PORT              - Listen port (default: 3000)
//!   STRONGBOX_DATA_DIR          - Persistent data directory (default: ./strongbox-data)
//!   STRONGBOX_TOKEN_KEY         - Hex HMAC-SHA-256 signing key, 32 bytes (required)
//!   STRONGBOX_TOKEN_TTL_SECS    - Token lifetime (default: 3600)
//!   STRONGBOX_DEV_KMS           - "true" to use the local dev KMS
//!   STRONGBOX_DEV_KEK           - Hex 32-byte master KEK (dev mode only)
//!   STRONGBOX_KMS_ENDPOINT      - Remote KMS base URL (prod mode)
//!   STRONGBOX_KMS_KEY_PATH      - projectId/location/keyring/keyId (prod mode)
//!   STRONGBOX_KMS_TIMEOUT_SECS  - KMS call timeout (default: 5)
//!   STRONGBOX_ADMIN_SECRET      - Bootstrap admin password (default: 0000, dev only)
//!   STRONGBOX_ROTATION_WORKERS  - Opportunistic-rotation worker count (default: 2)
//!   STRONGBOX_ROTATION_QUEUE    - Rotation queue capacity (default: 256)
//!   STRONGBOX_LOG_FORMAT        - "json" for structured logging, "pretty" for dev
//!
//! Startup order: configuration, durable store, KMS adapter, DEK cache,
//! bootstrap (admin client + first DEK), rotation pool, listener. Any
//! failure before the listener exits non-zero.

mod config;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use strongbox_keystore::{
    authorize, AccessCheck, AuditSink, AuthService, ClientRecord, DekEngine, DekRecord, DevKms,
    DurableStore, ErrorKind, FileStore, FolderRecord, FolderService, HttpKmsClient, KmsAdapter,
    RemoteKms, RotationPool, SecretRecord, SecretService, TokenSigner, TracingAuditSink, WILDCARD,
};

use config::{Config, DEV_KEK_ID};

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

struct AppState {
    auth: AuthService,
    engine: Arc<DekEngine>,
    secrets: SecretService,
    folders: FolderService,
    token_ttl: Duration,
}

type Shared = Arc<AppState>;

struct StateParams {
    token_key: Vec<u8>,
    token_ttl: Duration,
    admin_secret: String,
    rotation_workers: usize,
    rotation_queue: usize,
}

/// Wire the services together and run bootstrap: seed the admin client
/// and guarantee at least one DEK exists before traffic is accepted.
async fn init_state(
    store: Arc<dyn DurableStore>,
    kms: Arc<dyn KmsAdapter>,
    params: StateParams,
) -> Result<Shared, ErrorKind> {
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let engine = Arc::new(DekEngine::load(store.clone(), kms, audit.clone()).await?);

    let signer = TokenSigner::new(&params.token_key, params.token_ttl);
    let auth = AuthService::new(store.clone(), signer, audit.clone());
    auth.bootstrap_admin(&params.admin_secret)?;

    if engine.list_deks()?.is_empty() {
        engine.create_dek("primary").await?;
    }

    let pool = RotationPool::spawn(
        store.clone(),
        engine.clone(),
        audit.clone(),
        params.rotation_workers,
        params.rotation_queue,
    );
    let secrets = SecretService::new(store.clone(), engine.clone(), Some(pool), audit);
    let folders = FolderService::new(store);

    Ok(Arc::new(AppState {
        auth,
        engine,
        secrets,
        folders,
        token_ttl: params.token_ttl,
    }))
}

// ---------------------------------------------------------------------------
// Error mapping — ErrorKind to HTTP status, in exactly one place
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ApiError {
    error: String,
}

struct Failure(ErrorKind);

impl From<ErrorKind> for Failure {
    fn from(e: ErrorKind) -> Self {
        Self(e)
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
            ErrorKind::AuthenticationRequired
            | ErrorKind::InvalidCredentials
            | ErrorKind::InvalidToken
            | ErrorKind::InactiveClient => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden(_) => StatusCode::FORBIDDEN,
            ErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
            ErrorKind::Conflict(_) => StatusCode::CONFLICT,
            ErrorKind::CryptoFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::TransportCorruption(_) => StatusCode::BAD_GATEWAY,
            ErrorKind::TransportTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Kms(_) | ErrorKind::Storage(_) | ErrorKind::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internal details are logged, not leaked.
        let message = match &self.0 {
            ErrorKind::Kms(_) | ErrorKind::Storage(_) | ErrorKind::Internal(_) => {
                tracing::error!(error = %self.0, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ApiError { error: message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Authentication middleware
// ---------------------------------------------------------------------------

/// What each route demands. `None` means public.
fn required_check(path: &str, method: &str) -> Option<AccessCheck> {
    if path == "/health" {
        return None;
    }
    if path == "/client/login" && method == "POST" {
        return None;
    }
    // Client registration and all DEK management require the wildcard role.
    if path == "/client/register" || path == "/dek" || path.starts_with("/dek/") {
        return Some(AccessCheck::roles([WILDCARD]));
    }
    Some(AccessCheck::none())
}

async fn auth_middleware(
    State(state): State<Shared>,
    mut req: Request,
    next: Next,
) -> Result<Response, Failure> {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();

    let Some(check) = required_check(&path, &method) else {
        return Ok(next.run(req).await);
    };

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let ctx = state.auth.authenticate_bearer(header_value.as_deref())?;
    authorize(&ctx.client, &check)?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterReq {
    name: String,
    secret: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Deserialize)]
struct LoginReq {
    name: String,
    secret: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResp {
    token: String,
    client_id: Uuid,
    expires_in_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo {
    id: Uuid,
    name: String,
    active: bool,
    roles: Vec<String>,
    permissions: Vec<String>,
    created_at: String,
    updated_at: String,
    last_used_at: Option<String>,
}

impl ClientInfo {
    fn from_record(c: &ClientRecord) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            active: c.active,
            roles: c.roles.iter().cloned().collect(),
            permissions: c.permissions.iter().cloned().collect(),
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
            last_used_at: c.last_used_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Deserialize)]
struct CreateDekReq {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DekInfo {
    id: u32,
    name: String,
    kek_id: String,
    version: u32,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl DekInfo {
    /// Wrapped key material is deliberately absent.
    fn from_record(d: &DekRecord) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            kek_id: d.kek_id.clone(),
            version: d.version,
            active: d.active,
            created_at: d.created_at.to_rfc3339(),
            updated_at: d.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RotateKekReq {
    new_kek_id: String,
    old_kek_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSecretReq {
    name: String,
    value: String,
    folder_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSecretReq {
    name: Option<String>,
    value: Option<String>,
    folder_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretResp {
    id: Uuid,
    name: String,
    /// Decrypted value.
    data: String,
    dek_id: u32,
    folder_id: Option<Uuid>,
    last_rotation: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretMeta {
    id: Uuid,
    name: String,
    dek_id: u32,
    folder_id: Option<Uuid>,
    last_rotation: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SecretMeta {
    fn from_record(s: &SecretRecord) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            dek_id: s.dek_id,
            folder_id: s.folder_id,
            last_rotation: s.last_rotation.map(|t| t.to_rfc3339()),
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderReq {
    name: String,
    parent_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateFolderReq {
    name: Option<String>,
    parent_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FolderInfo {
    id: Uuid,
    name: String,
    parent_id: Option<Uuid>,
    created_at: String,
    updated_at: String,
}

impl FolderInfo {
    fn from_record(f: &FolderRecord) -> Self {
        Self {
            id: f.id,
            name: f.name.clone(),
            parent_id: f.parent_id,
            created_at: f.created_at.to_rfc3339(),
            updated_at: f.updated_at.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_client_name(name: &str) -> Result<(), ErrorKind> {
    if name.len() < 3 || name.len() > 100 {
        return Err(ErrorKind::validation("client name must be 3-100 characters"));
    }
    Ok(())
}

fn validate_client_secret(secret: &str) -> Result<(), ErrorKind> {
    if secret.len() < 8 {
        return Err(ErrorKind::validation("secret must be at least 8 characters"));
    }
    Ok(())
}

fn validate_dek_name(name: &str) -> Result<(), ErrorKind> {
    let len_ok = (1..=100).contains(&name.len());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !len_ok || !chars_ok {
        return Err(ErrorKind::validation("dek name must match [a-z0-9_-]{1,100}"));
    }
    Ok(())
}

fn validate_secret_name(name: &str) -> Result<(), ErrorKind> {
    if name.len() < 3 || name.len() > 255 {
        return Err(ErrorKind::validation("secret name must be 3-255 characters"));
    }
    if name.contains(' ') || name.contains('@') {
        return Err(ErrorKind::validation("secret name must not contain spaces or '@'"));
    }
    Ok(())
}

fn validate_secret_value(value: &str) -> Result<(), ErrorKind> {
    if value.len() < 8 {
        return Err(ErrorKind::validation("secret value must be at least 8 bytes"));
    }
    Ok(())
}

fn validate_folder_name(name: &str) -> Result<(), ErrorKind> {
    if name.is_empty() || name.len() > 100 {
        return Err(ErrorKind::validation("folder name must be 1-100 characters"));
    }
    Ok(())
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, ErrorKind> {
    Uuid::parse_str(s).map_err(|_| ErrorKind::validation(format!("invalid {} id '{}'", what, s)))
}

// ---------------------------------------------------------------------------
// Routes — health
// ---------------------------------------------------------------------------

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

// ---------------------------------------------------------------------------
// Routes — clients
// ---------------------------------------------------------------------------

async fn register_client(
    State(state): State<Shared>,
    Json(req): Json<RegisterReq>,
) -> Result<impl IntoResponse, Failure> {
    validate_client_name(&req.name)?;
    validate_client_secret(&req.secret)?;
    let client = state.auth.register(
        &req.name,
        &req.secret,
        req.roles.into_iter().collect(),
        req.permissions.into_iter().collect(),
    )?;
    Ok((StatusCode::CREATED, Json(ClientInfo::from_record(&client))))
}

async fn login(
    State(state): State<Shared>,
    Json(req): Json<LoginReq>,
) -> Result<Json<LoginResp>, Failure> {
    let outcome = state.auth.login(&req.name, &req.secret)?;
    Ok(Json(LoginResp {
        token: outcome.token,
        client_id: outcome.client.id,
        expires_in_secs: state.token_ttl.as_secs(),
    }))
}

async fn client_info(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<ClientInfo>, Failure> {
    let id = parse_uuid(&id, "client")?;
    let client = state.auth.client_info(&id)?;
    Ok(Json(ClientInfo::from_record(&client)))
}

async fn revoke_client(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<ClientInfo>, Failure> {
    let id = parse_uuid(&id, "client")?;
    let client = state.auth.revoke(&id)?;
    Ok(Json(ClientInfo::from_record(&client)))
}

// ---------------------------------------------------------------------------
// Routes — DEKs
// ---------------------------------------------------------------------------

async fn create_dek(
    State(state): State<Shared>,
    Json(req): Json<CreateDekReq>,
) -> Result<impl IntoResponse, Failure> {
    validate_dek_name(&req.name)?;
    let dek = state.engine.create_dek(&req.name).await?;
    Ok((StatusCode::CREATED, Json(DekInfo::from_record(&dek))))
}

async fn list_deks(State(state): State<Shared>) -> Result<Json<Vec<DekInfo>>, Failure> {
    let deks = state.engine.list_deks()?;
    Ok(Json(deks.iter().map(DekInfo::from_record).collect()))
}

async fn get_dek(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<DekInfo>, Failure> {
    let id: u32 = id
        .parse()
        .map_err(|_| ErrorKind::validation(format!("invalid dek id '{}'", id)))?;
    let dek = state.engine.get_dek(id)?;
    Ok(Json(DekInfo::from_record(&dek)))
}

async fn delete_dek(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Failure> {
    let id: u32 = id
        .parse()
        .map_err(|_| ErrorKind::validation(format!("invalid dek id '{}'", id)))?;
    state.engine.delete_dek(id)?;
    Ok(Json(serde_json::json!({"status": "deleted", "id": id})))
}

async fn rotate_kek(
    State(state): State<Shared>,
    Json(req): Json<RotateKekReq>,
) -> Result<impl IntoResponse, Failure> {
    if req.new_kek_id.is_empty() {
        return Err(ErrorKind::validation("newKekId must not be empty").into());
    }
    let report = state
        .engine
        .rotate_kek(&req.new_kek_id, req.old_kek_id.as_deref())
        .await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Routes — secrets
// ---------------------------------------------------------------------------

async fn create_secret(
    State(state): State<Shared>,
    Json(req): Json<CreateSecretReq>,
) -> Result<impl IntoResponse, Failure> {
    validate_secret_name(&req.name)?;
    validate_secret_value(&req.value)?;
    let record = state
        .secrets
        .create(&req.name, req.value.as_bytes(), req.folder_id)?;
    Ok((StatusCode::CREATED, Json(SecretMeta::from_record(&record))))
}

/// Fetch by UUID or by unique name.
async fn get_secret(
    State(state): State<Shared>,
    Path(key): Path<String>,
) -> Result<Json<SecretResp>, Failure> {
    let content = match Uuid::parse_str(&key) {
        Ok(id) => state.secrets.get(&id)?,
        Err(_) => state.secrets.get_by_name(&key)?,
    };
    let record = content.record;
    Ok(Json(SecretResp {
        id: record.id,
        name: record.name.clone(),
        data: String::from_utf8_lossy(&content.plaintext).into_owned(),
        dek_id: record.dek_id,
        folder_id: record.folder_id,
        last_rotation: record.last_rotation.map(|t| t.to_rfc3339()),
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
    }))
}

async fn update_secret(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSecretReq>,
) -> Result<Json<SecretMeta>, Failure> {
    let id = parse_uuid(&id, "secret")?;
    if let Some(name) = &req.name {
        validate_secret_name(name)?;
    }
    if let Some(value) = &req.value {
        validate_secret_value(value)?;
    }
    let record = state.secrets.update(
        &id,
        req.value.as_deref().map(str::as_bytes),
        req.name.as_deref(),
        req.folder_id.map(Some),
    )?;
    Ok(Json(SecretMeta::from_record(&record)))
}

async fn delete_secret(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Failure> {
    let id = parse_uuid(&id, "secret")?;
    state.secrets.delete(&id)?;
    Ok(Json(serde_json::json!({"status": "deleted", "id": id})))
}

async fn list_secrets(State(state): State<Shared>) -> Result<Json<Vec<SecretMeta>>, Failure> {
    let records = state.secrets.list()?;
    Ok(Json(records.iter().map(SecretMeta::from_record).collect()))
}

// ---------------------------------------------------------------------------
// Routes — folders
// ---------------------------------------------------------------------------

async fn create_folder(
    State(state): State<Shared>,
    Json(req): Json<CreateFolderReq>,
) -> Result<impl IntoResponse, Failure> {
    validate_folder_name(&req.name)?;
    let folder = state.folders.create(&req.name, req.parent_id)?;
    Ok((StatusCode::CREATED, Json(FolderInfo::from_record(&folder))))
}

async fn list_folders(State(state): State<Shared>) -> Result<Json<Vec<FolderInfo>>, Failure> {
    let folders = state.folders.list()?;
    Ok(Json(folders.iter().map(FolderInfo::from_record).collect()))
}

async fn get_folder(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<FolderInfo>, Failure> {
    let id = parse_uuid(&id, "folder")?;
    let folder = state.folders.get(&id)?;
    Ok(Json(FolderInfo::from_record(&folder)))
}

async fn update_folder(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFolderReq>,
) -> Result<Json<FolderInfo>, Failure> {
    let id = parse_uuid(&id, "folder")?;
    if let Some(name) = &req.name {
        validate_folder_name(name)?;
    }
    let folder = state
        .folders
        .update(&id, req.name.as_deref(), req.parent_id.map(Some))?;
    Ok(Json(FolderInfo::from_record(&folder)))
}

async fn delete_folder(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Failure> {
    let id = parse_uuid(&id, "folder")?;
    state.folders.delete(&id)?;
    Ok(Json(serde_json::json!({"status": "deleted", "id": id})))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn build_router(state: Shared) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/client/register", post(register_client))
        .route("/client/login", post(login))
        .route("/client/info/:id", get(client_info))
        .route("/client/:id/revoke", delete(revoke_client))
        .route("/dek", post(create_dek).get(list_deks))
        .route("/dek/rotate-kek", post(rotate_kek))
        .route("/dek/:id", get(get_dek).delete(delete_dek))
        .route("/secret", post(create_secret).get(list_secrets))
        .route("/secret/:key", get(get_secret).put(update_secret).delete(delete_secret))
        .route("/folder", post(create_folder).get(list_folders))
        .route("/folder/:id", get(get_folder).put(update_folder).delete(delete_folder))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

fn init_tracing(log_format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "strongbox_api=info,strongbox_keystore=info".into());
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

fn build_kms(cfg: &Config) -> Result<Arc<dyn KmsAdapter>, ErrorKind> {
    if cfg.dev_kms {
        let kek = cfg
            .dev_kek
            .ok_or_else(|| ErrorKind::validation("dev kms requires STRONGBOX_DEV_KEK"))?;
        tracing::warn!("dev KMS selected: KEK is held locally, not for production");
        Ok(Arc::new(DevKms::new(kek, DEV_KEK_ID)))
    } else {
        let endpoint = cfg.kms_endpoint.as_deref().unwrap_or_default();
        let key_path = cfg.kms_key_path.as_deref().unwrap_or_default();
        let client = Arc::new(HttpKmsClient::new(endpoint, cfg.kms_timeout)?);
        Ok(Arc::new(RemoteKms::new(client, key_path)?))
    }
}

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&cfg.log_format);

    if cfg.admin_secret_is_default {
        tracing::warn!("STRONGBOX_ADMIN_SECRET not set, using the default bootstrap password");
    }

    let store: Arc<dyn DurableStore> = match FileStore::new(&cfg.data_dir) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, data_dir = %cfg.data_dir, "durable store unavailable");
            std::process::exit(1);
        }
    };

    let kms = match build_kms(&cfg) {
        Ok(k) => k,
        Err(e) => {
            tracing::error!(error = %e, "kms adapter unavailable");
            std::process::exit(1);
        }
    };

    let params = StateParams {
        token_key: cfg.token_key.clone(),
        token_ttl: cfg.token_ttl,
        admin_secret: cfg.admin_secret.clone(),
        rotation_workers: cfg.rotation_workers,
        rotation_queue: cfg.rotation_queue,
    };
    let state = match init_state(store, kms, params).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(port = cfg.port, data_dir = %cfg.data_dir, "starting strongbox api");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, addr = %addr, "bind failed");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
