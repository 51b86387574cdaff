//! In-process fake vCenter speaking enough of the vSphere REST API for the
//! facade: sessions, inventory lists, VM power and snapshots.
//!
//! The name filter is deliberately case-insensitive so tests can observe
//! the client's own exact-match check.

#![allow(dead_code)]

use axum::extract::{Path, RawQuery, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vsphere_facade::VsphereConfig;

pub const USER: &str = "administrator@vsphere.local";
pub const PASSWORD: &str = "Sup3rS3cret!";

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeState {
    username: String,
    password: String,
    sessions: HashSet<String>,
    next_id: u32,
    /// Inventory objects keyed by kind ("vm", "datacenter", ...).
    objects: HashMap<&'static str, Vec<Value>>,
    /// Object id to (parent folder id, datacenter id).
    placement: HashMap<String, (&'static str, &'static str)>,
    /// Snapshots per VM, each carrying its parent id and a current flag.
    snapshots: HashMap<String, Vec<Value>>,
    pub requests: usize,
    pub logins: usize,
    pub logouts: usize,
}

impl FakeState {
    fn seeded() -> Self {
        let mut objects = HashMap::new();
        objects.insert(
            "vm",
            vec![
                vm("vm-1", "My_Linux_VM", "POWERED_ON"),
                vm("vm-2", "BuildBox01", "POWERED_OFF"),
                vm("vm-3", "TestBox01", "POWERED_ON"),
                vm("vm-4", "web01", "POWERED_ON"),
                vm("vm-5", "WEB01", "POWERED_OFF"),
                vm("vm-6", "web01", "SUSPENDED"),
                vm("vm-7", "web01-clone", "POWERED_OFF"),
            ],
        );
        objects.insert(
            "datacenter",
            vec![
                json!({"datacenter": "datacenter-1", "name": "DC1"}),
                json!({"datacenter": "datacenter-2", "name": "DC2"}),
            ],
        );
        objects.insert(
            "host",
            vec![json!({"host": "host-10", "name": "esx01.lab", "connection_state": "CONNECTED", "power_state": "POWERED_ON"})],
        );
        objects.insert(
            "datastore",
            vec![json!({"datastore": "datastore-11", "name": "ds-ssd", "type": "VMFS", "free_space": 1024u64, "capacity": 4096u64})],
        );
        objects.insert(
            "network",
            vec![json!({"network": "network-12", "name": "VM Network", "type": "STANDARD_PORTGROUP"})],
        );
        objects.insert(
            "folder",
            vec![
                json!({"folder": "group-v3", "name": "vm", "type": "VIRTUAL_MACHINE"}),
                json!({"folder": "group-v10", "name": "lab", "type": "VIRTUAL_MACHINE"}),
                json!({"folder": "group-v20", "name": "vm", "type": "VIRTUAL_MACHINE"}),
            ],
        );

        let placement = [
            ("vm-1", "group-v3", "datacenter-1"),
            ("vm-2", "group-v3", "datacenter-1"),
            ("vm-3", "group-v3", "datacenter-1"),
            ("vm-4", "group-v10", "datacenter-1"),
            ("vm-5", "group-v3", "datacenter-1"),
            ("vm-6", "group-v20", "datacenter-2"),
            ("vm-7", "group-v10", "datacenter-1"),
            ("group-v3", "group-d1", "datacenter-1"),
            ("group-v10", "group-v3", "datacenter-1"),
            ("group-v20", "group-d1", "datacenter-2"),
            ("host-10", "group-h4", "datacenter-1"),
            ("datastore-11", "group-s5", "datacenter-1"),
            ("network-12", "group-n6", "datacenter-1"),
        ]
        .into_iter()
        .map(|(id, folder, dc)| (id.to_string(), (folder, dc)))
        .collect();

        let mut snapshots = HashMap::new();
        snapshots.insert(
            "vm-3".to_string(),
            vec![
                snap("snapshot-1", "clean_state", "POWERED_OFF", None, false),
                snap("snapshot-2", "pre_upgrade", "POWERED_ON", Some("snapshot-1"), false),
                snap("snapshot-3", "nightly", "POWERED_ON", Some("snapshot-2"), false),
                snap("snapshot-4", "nightly", "POWERED_ON", Some("snapshot-3"), true),
            ],
        );

        Self {
            username: USER.into(),
            password: PASSWORD.into(),
            sessions: HashSet::new(),
            next_id: 100,
            objects,
            placement,
            snapshots,
            requests: 0,
            logins: 0,
            logouts: 0,
        }
    }

    fn vm_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.objects
            .get_mut("vm")
            .and_then(|vms| vms.iter_mut().find(|v| v["vm"] == id))
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get("vmware-api-session-id")
            .and_then(|v| v.to_str().ok())
            .map(|sid| self.sessions.contains(sid))
            .unwrap_or(false)
    }
}

fn vm(id: &str, name: &str, state: &str) -> Value {
    json!({"vm": id, "name": name, "power_state": state, "cpu_count": 2, "memory_size_MiB": 4096})
}

fn snap(id: &str, name: &str, state: &str, parent: Option<&str>, current: bool) -> Value {
    json!({
        "snapshot": id,
        "name": name,
        "description": format!("{name} snapshot"),
        "power_state": state,
        "parent": parent,
        "current": current,
    })
}

/// `root` and every snapshot below it.
fn subtree(snaps: &[Value], root: &str) -> HashSet<String> {
    let mut found = HashSet::from([root.to_string()]);
    loop {
        let before = found.len();
        for s in snaps {
            let parent = s["parent"].as_str().unwrap_or_default();
            if found.contains(parent) {
                found.insert(s["snapshot"].as_str().unwrap_or_default().to_string());
            }
        }
        if found.len() == before {
            return found;
        }
    }
}

fn mark_current(snaps: &mut [Value], id: Option<&str>) {
    for s in snaps {
        let is_current = id.is_some_and(|id| s["snapshot"] == id);
        s["current"] = json!(is_current);
    }
}

fn error(status: StatusCode, error_type: &str, msg: &str) -> Response {
    (
        status,
        Json(json!({"error_type": error_type, "messages": [{"id": "fake", "default_message": msg}]})),
    )
        .into_response()
}

fn unauthenticated() -> Response {
    error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "Authentication required.")
}

fn query_pairs(q: &Option<String>) -> Vec<(String, String)> {
    q.as_deref()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

fn query_values(q: &Option<String>, key: &str) -> Vec<String> {
    query_pairs(q)
        .into_iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v)
        .collect()
}

// ── Handlers ────────────────────────────────────────────────────────

async fn count_requests(State(state): State<Shared>, req: Request, next: Next) -> Response {
    state.lock().unwrap().requests += 1;
    next.run(req).await
}

async fn login(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut st = state.lock().unwrap();
    let creds = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|b| base64::engine::general_purpose::STANDARD.decode(b).ok())
        .and_then(|raw| String::from_utf8(raw).ok());
    let expected = format!("{}:{}", st.username, st.password);
    if creds.as_deref() != Some(expected.as_str()) {
        return unauthenticated();
    }
    st.next_id += 1;
    st.logins += 1;
    let sid = format!("fake-session-{}", st.next_id);
    st.sessions.insert(sid.clone());
    (StatusCode::CREATED, Json(sid)).into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut st = state.lock().unwrap();
    let sid = headers
        .get("vmware-api-session-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !st.sessions.remove(&sid) {
        return unauthenticated();
    }
    st.logouts += 1;
    StatusCode::NO_CONTENT.into_response()
}

async fn session_info(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    Json(json!({"user": st.username})).into_response()
}

async fn list_kind(state: Shared, headers: HeaderMap, q: Option<String>, kind: &'static str) -> Response {
    let st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    let names = query_values(&q, "names");
    let states = query_values(&q, "power_states");
    if let Some(bad) = states
        .iter()
        .find(|s| !["POWERED_ON", "POWERED_OFF", "SUSPENDED"].contains(&s.as_str()))
    {
        let msg = format!("Invalid power state {bad}.");
        return error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", &msg);
    }
    let folders = query_values(&q, "folders");
    let parent_folders = query_values(&q, "parent_folders");
    let datacenters = query_values(&q, "datacenters");
    let placed = |o: &Value| {
        let id = o[kind].as_str().unwrap_or_default();
        st.placement.get(id).copied().unwrap_or_default()
    };
    let items: Vec<Value> = st
        .objects
        .get(kind)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|o| {
            let name = o["name"].as_str().unwrap_or_default();
            names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(name))
        })
        .filter(|o| {
            let state = o["power_state"].as_str().unwrap_or_default();
            states.is_empty() || states.iter().any(|s| s == state)
        })
        .filter(|o| {
            let (folder, dc) = placed(o);
            let in_folder = if kind == "folder" { &parent_folders } else { &folders };
            (in_folder.is_empty() || in_folder.iter().any(|f| f == folder))
                && (datacenters.is_empty() || datacenters.iter().any(|d| d == dc))
        })
        .collect();
    Json(items).into_response()
}

async fn vm_info(State(state): State<Shared>, headers: HeaderMap, Path(vm): Path<String>) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    match st.vm_mut(&vm) {
        Some(v) => Json(json!({
            "name": v["name"],
            "power_state": v["power_state"],
            "guest_OS": "UBUNTU_64",
            "cpu": {"count": 2, "cores_per_socket": 1, "hot_add_enabled": false},
            "memory": {"size_MiB": 4096, "hot_add_enabled": false},
            "hardware": {"version": "VMX_19", "upgrade_policy": "NEVER"}
        }))
        .into_response(),
        None => error(StatusCode::NOT_FOUND, "NOT_FOUND", "VM not found."),
    }
}

async fn power_get(State(state): State<Shared>, headers: HeaderMap, Path(vm): Path<String>) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    match st.vm_mut(&vm) {
        Some(v) => Json(json!({"state": v["power_state"]})).into_response(),
        None => error(StatusCode::NOT_FOUND, "NOT_FOUND", "VM not found."),
    }
}

async fn power_action(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(vm): Path<String>,
    RawQuery(q): RawQuery,
) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    let action = query_values(&q, "action").into_iter().next().unwrap_or_default();
    let Some(v) = st.vm_mut(&vm) else {
        return error(StatusCode::NOT_FOUND, "NOT_FOUND", "VM not found.");
    };
    let current = v["power_state"].as_str().unwrap_or_default().to_string();
    let next = match (action.as_str(), current.as_str()) {
        ("start", "POWERED_ON") | ("stop", "POWERED_OFF") => {
            return error(
                StatusCode::BAD_REQUEST,
                "ALREADY_IN_DESIRED_STATE",
                "Virtual machine is already in the requested power state.",
            )
        }
        ("start", _) => "POWERED_ON",
        ("stop", _) => "POWERED_OFF",
        ("suspend", "POWERED_ON") | ("reset", "POWERED_ON") => {
            if action == "suspend" {
                "SUSPENDED"
            } else {
                "POWERED_ON"
            }
        }
        ("suspend", _) | ("reset", _) => {
            return error(
                StatusCode::BAD_REQUEST,
                "NOT_ALLOWED_IN_CURRENT_STATE",
                "Operation not allowed in the current power state.",
            )
        }
        _ => return error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", "Unknown action."),
    };
    v["power_state"] = json!(next);
    StatusCode::NO_CONTENT.into_response()
}

async fn guest_action(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(vm): Path<String>,
    RawQuery(q): RawQuery,
) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    let action = query_values(&q, "action").into_iter().next().unwrap_or_default();
    let Some(v) = st.vm_mut(&vm) else {
        return error(StatusCode::NOT_FOUND, "NOT_FOUND", "VM not found.");
    };
    if v["power_state"] != "POWERED_ON" {
        return error(
            StatusCode::BAD_REQUEST,
            "NOT_ALLOWED_IN_CURRENT_STATE",
            "Guest operations require a running VM.",
        );
    }
    match action.as_str() {
        "shutdown" => v["power_state"] = json!("POWERED_OFF"),
        "standby" => v["power_state"] = json!("SUSPENDED"),
        "reboot" => {}
        _ => return error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", "Unknown action."),
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_snapshots(State(state): State<Shared>, headers: HeaderMap, Path(vm): Path<String>) -> Response {
    let st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    match st.snapshots.get(&vm) {
        Some(snaps) if !snaps.is_empty() => Json(snaps.clone()).into_response(),
        _ => error(StatusCode::NOT_FOUND, "NOT_FOUND", "No snapshots."),
    }
}

async fn create_snapshot(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(vm): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    let Some(current) = st.vm_mut(&vm).map(|v| v["power_state"].clone()) else {
        return error(StatusCode::NOT_FOUND, "NOT_FOUND", "VM not found.");
    };
    st.next_id += 1;
    let id = format!("snapshot-{}", st.next_id);
    let snaps = st.snapshots.entry(vm).or_default();
    let parent = snaps.iter().find(|s| s["current"] == true).map(|s| s["snapshot"].clone());
    mark_current(snaps, None);
    snaps.push(json!({
        "snapshot": id,
        "name": body["name"],
        "description": body["description"],
        "power_state": current,
        "parent": parent,
        "current": true,
    }));
    (StatusCode::CREATED, Json(id)).into_response()
}

async fn revert_snapshot(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((vm, snapshot)): Path<(String, String)>,
    RawQuery(q): RawQuery,
) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    if query_values(&q, "action").first().map(String::as_str) != Some("revert") {
        return error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", "Unknown action.");
    }
    let captured = st
        .snapshots
        .get(&vm)
        .and_then(|snaps| snaps.iter().find(|s| s["snapshot"] == snapshot.as_str()))
        .map(|s| s["power_state"].clone());
    let Some(captured) = captured else {
        return error(StatusCode::NOT_FOUND, "NOT_FOUND", "Snapshot not found.");
    };
    if let Some(snaps) = st.snapshots.get_mut(&vm) {
        mark_current(snaps, Some(snapshot.as_str()));
    }
    if let Some(v) = st.vm_mut(&vm) {
        v["power_state"] = captured;
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_snapshot(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((vm, snapshot)): Path<(String, String)>,
    RawQuery(q): RawQuery,
) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    let cascade = query_values(&q, "remove_children").first().map(String::as_str) == Some("true");
    let target = st
        .snapshots
        .get(&vm)
        .and_then(|snaps| snaps.iter().find(|s| s["snapshot"] == snapshot.as_str()))
        .cloned();
    let (Some(target), Some(snaps)) = (target, st.snapshots.get_mut(&vm)) else {
        return error(StatusCode::NOT_FOUND, "NOT_FOUND", "Snapshot not found.");
    };
    let doomed = if cascade {
        subtree(snaps, &snapshot)
    } else {
        HashSet::from([snapshot.clone()])
    };
    let lost_current = snaps
        .iter()
        .any(|s| s["current"] == true && doomed.contains(s["snapshot"].as_str().unwrap_or_default()));
    snaps.retain(|s| !doomed.contains(s["snapshot"].as_str().unwrap_or_default()));
    for s in snaps.iter_mut() {
        if s["parent"] == snapshot.as_str() {
            s["parent"] = target["parent"].clone();
        }
    }
    if lost_current {
        mark_current(snaps, target["parent"].as_str());
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn update_snapshot(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((vm, snapshot)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut st = state.lock().unwrap();
    if !st.authorized(&headers) {
        return unauthenticated();
    }
    let found = st
        .snapshots
        .get_mut(&vm)
        .and_then(|snaps| snaps.iter_mut().find(|s| s["snapshot"] == snapshot.as_str()));
    let Some(s) = found else {
        return error(StatusCode::NOT_FOUND, "NOT_FOUND", "Snapshot not found.");
    };
    for field in ["name", "description"] {
        if let Some(value) = body.get(field).filter(|v| !v.is_null()) {
            s[field] = value.clone();
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/session", get(session_info).post(login).delete(logout))
        .route(
            "/api/vcenter/vm",
            get(|State(s): State<Shared>, h: HeaderMap, RawQuery(q): RawQuery| list_kind(s, h, q, "vm")),
        )
        .route(
            "/api/vcenter/datacenter",
            get(|State(s): State<Shared>, h: HeaderMap, RawQuery(q): RawQuery| list_kind(s, h, q, "datacenter")),
        )
        .route(
            "/api/vcenter/host",
            get(|State(s): State<Shared>, h: HeaderMap, RawQuery(q): RawQuery| list_kind(s, h, q, "host")),
        )
        .route(
            "/api/vcenter/datastore",
            get(|State(s): State<Shared>, h: HeaderMap, RawQuery(q): RawQuery| list_kind(s, h, q, "datastore")),
        )
        .route(
            "/api/vcenter/network",
            get(|State(s): State<Shared>, h: HeaderMap, RawQuery(q): RawQuery| list_kind(s, h, q, "network")),
        )
        .route(
            "/api/vcenter/folder",
            get(|State(s): State<Shared>, h: HeaderMap, RawQuery(q): RawQuery| list_kind(s, h, q, "folder")),
        )
        .route("/api/vcenter/vm/:vm", get(vm_info))
        .route("/api/vcenter/vm/:vm/power", get(power_get).post(power_action))
        .route("/api/vcenter/vm/:vm/guest/power", axum::routing::post(guest_action))
        .route(
            "/api/vcenter/vm/:vm/snapshots",
            get(list_snapshots).post(create_snapshot),
        )
        .route(
            "/api/vcenter/vm/:vm/snapshots/:snapshot",
            axum::routing::post(revert_snapshot)
                .patch(update_snapshot)
                .delete(delete_snapshot),
        )
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .with_state(state)
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct FakeVCenter {
    pub addr: SocketAddr,
    state: Shared,
}

impl FakeVCenter {
    /// Serve on the current Tokio runtime.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::seeded()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    /// Serve from a dedicated thread, for tests that have no runtime of
    /// their own (the blocking facade).
    pub fn start_in_background() -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let fake = FakeVCenter::start().await;
                tx.send((fake.addr, fake.state.clone())).unwrap();
                std::future::pending::<()>().await;
            });
        });
        let (addr, state) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> VsphereConfig {
        self.config_with(USER, PASSWORD)
    }

    pub fn config_with(&self, user: &str, password: &str) -> VsphereConfig {
        VsphereConfig::new("fake-vcenter.lab", user, password)
            .with_base_url(self.base_url())
            .with_timeout_secs(5)
    }

    pub fn requests(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    pub fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    pub fn logouts(&self) -> usize {
        self.state.lock().unwrap().logouts
    }

    pub fn active_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Invalidate every session server-side, as a vCenter restart would.
    pub fn expire_sessions(&self) {
        self.state.lock().unwrap().sessions.clear();
    }

    pub fn power_state_of(&self, vm_id: &str) -> String {
        let mut st = self.state.lock().unwrap();
        st.vm_mut(vm_id)
            .and_then(|v| v["power_state"].as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn current_snapshot_of(&self, vm_id: &str) -> Option<String> {
        let st = self.state.lock().unwrap();
        st.snapshots
            .get(vm_id)?
            .iter()
            .find(|s| s["current"] == true)
            .and_then(|s| s["name"].as_str().map(str::to_string))
    }

    pub fn snapshot_names(&self, vm_id: &str) -> Vec<String> {
        let st = self.state.lock().unwrap();
        st.snapshots
            .get(vm_id)
            .map(|snaps| {
                snaps
                    .iter()
                    .filter_map(|s| s["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
