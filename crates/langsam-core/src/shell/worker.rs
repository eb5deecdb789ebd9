//! The shell cache worker.
//!
//! Runs as an actor in its own tokio task. The storage is owned by the actor
//! and every operation arrives as a `WorkerMessage` with a oneshot reply, so
//! install always finishes before activate or fetch can look at the stores.
//!
//! Serving is stale-while-revalidate: a cached copy is answered immediately
//! and refreshed in the background; the refresh posts its result back into the
//! mailbox, where the actor writes it to the current store. `settle` waits for
//! those refreshes, for callers that exit right after a request.

use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::Url;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::error::ShellError;
use super::network::Network;
use super::storage::{CacheStorage, CachedResponse, ShellResponse};

/// Generation tag of the current shell cache.
pub const CACHE_VERSION: &str = "shell-v1";

/// Paths that make up the application shell.
pub const SHELL_MANIFEST: &[&str] = &["/", "/index.html", "/app.js", "/styles.css", "/manifest.json"];

const MAILBOX_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub cache_version: String,
    pub manifest: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            cache_version: CACHE_VERSION.to_string(),
            manifest: SHELL_MANIFEST.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ShellConfig {
    pub fn with_manifest<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            manifest: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

/// What the worker does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercept {
    /// Not a shell path; the caller handles it without the cache.
    PassThrough,
    Respond {
        response: ShellResponse,
        source: ResponseSource,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub tag: String,
    pub paths: Vec<String>,
}

/// A cached entry and the store it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub tag: String,
    pub entry: CachedResponse,
}

type Reply<T> = oneshot::Sender<Result<T, ShellError>>;

enum WorkerMessage {
    Install {
        reply: Reply<InstallReport>,
    },
    Activate {
        reply: Reply<Vec<String>>,
    },
    Fetch {
        path: String,
        reply: Reply<Intercept>,
    },
    /// A network result for `path`. `reply` is set when a caller is waiting on it.
    Fetched {
        path: String,
        result: Result<ShellResponse, ShellError>,
        reply: Option<Reply<Intercept>>,
    },
    Keys {
        reply: Reply<Vec<String>>,
    },
    Cached {
        path: String,
        reply: Reply<Option<CacheHit>>,
    },
    /// Reply once no network fetch is outstanding.
    Settle {
        reply: Reply<()>,
    },
}

/// Strip query, fragment and origin from a request target.
pub fn normalize_path(request: &str) -> String {
    let path = match Url::parse(request) {
        Ok(url) => url.path().to_string(),
        Err(_) => request
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// Start a worker on the current tokio runtime.
pub fn spawn<S, N>(config: ShellConfig, storage: S, network: N) -> ShellWorkerHandle
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let worker = ShellWorker {
        config,
        storage: Box::new(storage),
        network: Arc::new(network),
        mailbox: tx.downgrade(),
        installed: false,
        in_flight: 0,
        settle_waiters: Vec::new(),
    };
    tokio::spawn(worker.run(rx));
    ShellWorkerHandle { mailbox: tx }
}

struct ShellWorker {
    config: ShellConfig,
    storage: Box<dyn CacheStorage>,
    network: Arc<dyn Network>,
    mailbox: mpsc::WeakSender<WorkerMessage>,
    installed: bool,
    in_flight: usize,
    settle_waiters: Vec<Reply<()>>,
}

impl ShellWorker {
    async fn run(mut self, mut inbox: mpsc::Receiver<WorkerMessage>) {
        debug!(tag = %self.config.cache_version, "Shell worker started");
        while let Some(message) = inbox.recv().await {
            self.handle(message).await;
        }
        debug!("Shell worker mailbox closed, stopping");
    }

    async fn handle(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Install { reply } => {
                let _ = reply.send(self.install().await);
            }
            WorkerMessage::Activate { reply } => {
                let _ = reply.send(self.activate());
            }
            WorkerMessage::Fetch { path, reply } => self.fetch(path, reply),
            WorkerMessage::Fetched {
                path,
                result,
                reply,
            } => self.on_fetched(path, result, reply),
            WorkerMessage::Keys { reply } => {
                let _ = reply.send(self.storage.keys());
            }
            WorkerMessage::Cached { path, reply } => {
                let _ = reply.send(self.lookup(&normalize_path(&path)));
            }
            WorkerMessage::Settle { reply } => {
                if self.in_flight == 0 {
                    let _ = reply.send(Ok(()));
                } else {
                    self.settle_waiters.push(reply);
                }
            }
        }
    }

    async fn install(&mut self) -> Result<InstallReport, ShellError> {
        let tag = self.config.cache_version.clone();
        let manifest = self.config.manifest.clone();
        info!(tag = %tag, paths = manifest.len(), "Installing shell");

        let network = self.network.clone();
        let fetches = manifest.iter().cloned().map(|path| {
            let network = network.clone();
            async move {
                let response = network
                    .fetch(&path)
                    .await
                    .map_err(|e| ShellError::Install {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                if !response.is_success() {
                    return Err(ShellError::Install {
                        reason: format!("HTTP {}", response.status),
                        path,
                    });
                }
                Ok((path, response))
            }
        });
        let responses = try_join_all(fetches).await.inspect_err(|e| {
            warn!(error = %e, "Shell install aborted, nothing cached");
        })?;

        for (path, response) in &responses {
            if let Err(e) = self.storage.put(&tag, path, response) {
                warn!(path = %path, error = %e, "Failed to write shell cache, rolling back");
                if let Err(cleanup) = self.storage.delete(&tag) {
                    warn!(tag = %tag, error = %cleanup, "Failed to remove partial shell cache");
                }
                return Err(ShellError::Install {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }

        self.installed = true;
        info!(tag = %tag, "Shell installed");
        Ok(InstallReport {
            tag,
            paths: manifest,
        })
    }

    /// Drop every store but the current one.
    ///
    /// The current store must hold the whole manifest, either from an install
    /// in this worker or from an earlier run. Entries written while serving
    /// alone never qualify.
    fn activate(&mut self) -> Result<Vec<String>, ShellError> {
        let current = self.config.cache_version.clone();
        if !self.installed && !self.current_is_complete()? {
            warn!(tag = %current, "Refusing to activate an incomplete shell cache");
            return Err(ShellError::NotInstalled(current));
        }

        let mut purged = Vec::new();
        for tag in self.storage.keys()? {
            if tag != current && self.storage.delete(&tag)? {
                purged.push(tag);
            }
        }
        info!(tag = %current, purged = ?purged, "Shell activated");
        Ok(purged)
    }

    fn fetch(&mut self, request: String, reply: Reply<Intercept>) {
        let path = normalize_path(&request);
        if !self.config.manifest.contains(&path) {
            let _ = reply.send(Ok(Intercept::PassThrough));
            return;
        }

        match self.lookup(&path) {
            Ok(Some(hit)) => {
                debug!(path = %path, tag = %hit.tag, age = %hit.entry.age_display(), "Serving shell from cache");
                let _ = reply.send(Ok(Intercept::Respond {
                    response: hit.entry.data,
                    source: ResponseSource::Cache,
                }));
                self.spawn_network_fetch(path, None);
            }
            Ok(None) => self.spawn_network_fetch(path, Some(reply)),
            Err(e) => {
                warn!(path = %path, error = %e, "Shell cache lookup failed, using network");
                self.spawn_network_fetch(path, Some(reply));
            }
        }
    }

    fn current_is_complete(&self) -> Result<bool, ShellError> {
        let current = &self.config.cache_version;
        if !self.storage.has(current)? {
            return Ok(false);
        }
        for path in &self.config.manifest {
            if self.storage.get(current, path)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Current store first, then any older generation still around.
    fn lookup(&self, path: &str) -> Result<Option<CacheHit>, ShellError> {
        let current = &self.config.cache_version;
        if let Some(entry) = self.storage.get(current, path)? {
            return Ok(Some(CacheHit {
                tag: current.clone(),
                entry,
            }));
        }
        for tag in self.storage.keys()? {
            if tag == *current {
                continue;
            }
            if let Some(entry) = self.storage.get(&tag, path)? {
                return Ok(Some(CacheHit { tag, entry }));
            }
        }
        Ok(None)
    }

    fn spawn_network_fetch(&mut self, path: String, reply: Option<Reply<Intercept>>) {
        self.in_flight += 1;
        let network = self.network.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = network.fetch(&path).await;
            let Some(mailbox) = mailbox.upgrade() else {
                return;
            };
            let _ = mailbox
                .send(WorkerMessage::Fetched {
                    path,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn on_fetched(
        &mut self,
        path: String,
        result: Result<ShellResponse, ShellError>,
        reply: Option<Reply<Intercept>>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.store_fetched(path, result, reply);
        if self.in_flight == 0 {
            for waiter in self.settle_waiters.drain(..) {
                let _ = waiter.send(Ok(()));
            }
        }
    }

    fn store_fetched(
        &mut self,
        path: String,
        result: Result<ShellResponse, ShellError>,
        reply: Option<Reply<Intercept>>,
    ) {
        match result {
            Ok(response) => {
                if response.is_success() {
                    if let Err(e) = self.storage.put(&self.config.cache_version, &path, &response) {
                        warn!(path = %path, error = %e, "Failed to store shell response");
                    }
                } else {
                    debug!(path = %path, status = response.status, "Not caching unsuccessful response");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(Intercept::Respond {
                        response,
                        source: ResponseSource::Network,
                    }));
                }
            }
            Err(e) => match reply {
                Some(reply) => {
                    let _ = reply.send(Err(e));
                }
                None => debug!(path = %path, error = %e, "Revalidation failed, keeping cached copy"),
            },
        }
    }
}

/// Cloneable handle to a running worker. The worker stops once every handle is dropped.
#[derive(Clone)]
pub struct ShellWorkerHandle {
    mailbox: mpsc::Sender<WorkerMessage>,
}

impl ShellWorkerHandle {
    async fn request<T>(
        &self,
        message: impl FnOnce(Reply<T>) -> WorkerMessage,
    ) -> Result<T, ShellError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox
            .send(message(tx))
            .await
            .map_err(|_| ShellError::WorkerStopped)?;
        rx.await.map_err(|_| ShellError::WorkerStopped)?
    }

    /// Fetch the whole manifest into the current store. All or nothing.
    pub async fn install(&self) -> Result<InstallReport, ShellError> {
        self.request(|reply| WorkerMessage::Install { reply }).await
    }

    /// Purge every store but the current one. Returns the purged tags.
    pub async fn activate(&self) -> Result<Vec<String>, ShellError> {
        self.request(|reply| WorkerMessage::Activate { reply }).await
    }

    pub async fn fetch(&self, path: &str) -> Result<Intercept, ShellError> {
        let path = path.to_string();
        self.request(|reply| WorkerMessage::Fetch { path, reply })
            .await
    }

    pub async fn keys(&self) -> Result<Vec<String>, ShellError> {
        self.request(|reply| WorkerMessage::Keys { reply }).await
    }

    pub async fn cached(&self, path: &str) -> Result<Option<CacheHit>, ShellError> {
        let path = path.to_string();
        self.request(|reply| WorkerMessage::Cached { path, reply })
            .await
    }

    /// Wait until every background refresh has been written (or dropped).
    pub async fn settle(&self) -> Result<(), ShellError> {
        self.request(|reply| WorkerMessage::Settle { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::shell::storage::MemoryCacheStorage;

    fn ok(body: &str) -> ShellResponse {
        ShellResponse::new(200, Some("text/html".to_string()), body)
    }

    /// Network double with canned responses and an optional gate.
    #[derive(Clone, Default)]
    struct FakeNetwork {
        responses: Arc<Mutex<HashMap<String, Result<ShellResponse, String>>>>,
        requests: Arc<Mutex<Vec<String>>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakeNetwork {
        fn serving(entries: &[(&str, &str)]) -> Self {
            let network = Self::default();
            for (path, body) in entries {
                network.respond(path, Ok(ok(body)));
            }
            network
        }

        fn gated(mut self) -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            self.gate = Some(gate.clone());
            (self, gate)
        }

        fn respond(&self, path: &str, result: Result<ShellResponse, String>) {
            self.responses
                .lock()
                .unwrap()
                .insert(path.to_string(), result);
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, path: &str) -> Result<ShellResponse, ShellError> {
            self.requests.lock().unwrap().push(path.to_string());
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            let canned = self.responses.lock().unwrap().get(path).cloned();
            match canned {
                Some(Ok(response)) => Ok(response),
                Some(Err(reason)) => Err(ShellError::Network {
                    path: path.to_string(),
                    reason,
                }),
                None => Ok(ShellResponse::new(404, None, Vec::new())),
            }
        }
    }

    /// Memory storage whose writes start failing after `ok_writes`.
    struct FlakyStorage {
        inner: MemoryCacheStorage,
        ok_writes: usize,
    }

    impl CacheStorage for FlakyStorage {
        fn keys(&self) -> Result<Vec<String>, ShellError> {
            self.inner.keys()
        }

        fn has(&self, tag: &str) -> Result<bool, ShellError> {
            self.inner.has(tag)
        }

        fn get(&self, tag: &str, path: &str) -> Result<Option<CachedResponse>, ShellError> {
            self.inner.get(tag, path)
        }

        fn put(&mut self, tag: &str, path: &str, response: &ShellResponse) -> Result<(), ShellError> {
            if self.ok_writes == 0 {
                return Err(ShellError::Io(std::io::Error::other("disk full")));
            }
            self.ok_writes -= 1;
            self.inner.put(tag, path, response)
        }

        fn delete(&mut self, tag: &str) -> Result<bool, ShellError> {
            self.inner.delete(tag)
        }
    }

    fn seeded(entries: &[(&str, &str, &str)]) -> MemoryCacheStorage {
        let mut storage = MemoryCacheStorage::new();
        for (tag, path, body) in entries {
            storage.put(tag, path, &ok(body)).unwrap();
        }
        storage
    }

    async fn wait_for_body(handle: &ShellWorkerHandle, path: &str, body: &str) -> bool {
        for _ in 0..200 {
            if let Ok(Some(hit)) = handle.cached(path).await {
                if hit.entry.data.body == body.as_bytes() {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/app.js?v=3"), "/app.js");
        assert_eq!(normalize_path("/index.html#top"), "/index.html");
        assert_eq!(normalize_path("https://news.example/styles.css?x"), "/styles.css");
        assert_eq!(normalize_path("https://news.example"), "/");
        assert_eq!(normalize_path("manifest.json"), "/manifest.json");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_default_config() {
        let config = ShellConfig::default();
        assert_eq!(config.cache_version, "shell-v1");
        assert_eq!(
            config.manifest,
            vec!["/", "/index.html", "/app.js", "/styles.css", "/manifest.json"]
        );
    }

    #[tokio::test]
    async fn test_install_caches_manifest() {
        let network = FakeNetwork::serving(&[("/", "root"), ("/index.html", "index")]);
        let handle = spawn(
            ShellConfig::with_manifest(["/", "/index.html"]),
            MemoryCacheStorage::new(),
            network,
        );

        let report = handle.install().await.unwrap();
        assert_eq!(report.tag, CACHE_VERSION);
        assert_eq!(report.paths, vec!["/", "/index.html"]);

        for (path, body) in [("/", "root"), ("/index.html", "index")] {
            let hit = handle.cached(path).await.unwrap().unwrap();
            assert_eq!(hit.tag, CACHE_VERSION);
            assert_eq!(hit.entry.data.body, body.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let network = FakeNetwork::serving(&[("/", "root")]);
        network.respond("/index.html", Err("connection reset".to_string()));
        let handle = spawn(
            ShellConfig::with_manifest(["/", "/index.html"]),
            MemoryCacheStorage::new(),
            network,
        );

        let err = handle.install().await.unwrap_err();
        assert!(matches!(err, ShellError::Install { ref path, .. } if path == "/index.html"));
        assert!(handle.keys().await.unwrap().is_empty());
        assert!(matches!(
            handle.activate().await,
            Err(ShellError::NotInstalled(_))
        ));
    }

    #[tokio::test]
    async fn test_install_rejects_unsuccessful_status() {
        // "/app.js" has no canned response and comes back 404.
        let network = FakeNetwork::serving(&[("/", "root")]);
        let handle = spawn(
            ShellConfig::with_manifest(["/", "/app.js"]),
            MemoryCacheStorage::new(),
            network,
        );

        let err = handle.install().await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
        assert!(handle.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_write_failure_rolls_back() {
        let network = FakeNetwork::serving(&[("/", "root"), ("/index.html", "index")]);
        let storage = FlakyStorage {
            inner: MemoryCacheStorage::new(),
            ok_writes: 1,
        };
        let handle = spawn(ShellConfig::with_manifest(["/", "/index.html"]), storage, network);

        assert!(matches!(
            handle.install().await,
            Err(ShellError::Install { .. })
        ));
        assert!(handle.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_purges_old_generations() {
        let network = FakeNetwork::serving(&[("/", "root")]);
        let storage = seeded(&[("shell-v0", "/", "old"), ("scratch", "/", "junk")]);
        let handle = spawn(ShellConfig::with_manifest(["/"]), storage, network);

        handle.install().await.unwrap();
        let mut purged = handle.activate().await.unwrap();
        purged.sort();
        assert_eq!(purged, vec!["scratch", "shell-v0"]);
        assert_eq!(handle.keys().await.unwrap(), vec![CACHE_VERSION]);
    }

    #[tokio::test]
    async fn test_activate_accepts_store_from_previous_run() {
        let storage = seeded(&[(CACHE_VERSION, "/", "root"), ("shell-v0", "/", "old")]);
        let handle = spawn(ShellConfig::with_manifest(["/"]), storage, FakeNetwork::default());

        assert_eq!(handle.activate().await.unwrap(), vec!["shell-v0"]);
    }

    #[tokio::test]
    async fn test_activate_refuses_store_filled_only_by_serving() {
        let network = FakeNetwork::serving(&[("/", "new root")]);
        network.respond("/index.html", Err("offline".to_string()));
        let storage = seeded(&[("shell-v0", "/", "old root"), ("shell-v0", "/index.html", "old index")]);
        let handle = spawn(ShellConfig::with_manifest(["/", "/index.html"]), storage, network);

        assert!(handle.install().await.is_err());
        handle.fetch("/").await.unwrap();
        handle.settle().await.unwrap();
        // Serving refreshed "/" into the current store, which is still incomplete.
        assert_eq!(handle.cached("/").await.unwrap().unwrap().tag, CACHE_VERSION);

        assert!(matches!(
            handle.activate().await,
            Err(ShellError::NotInstalled(_))
        ));
        assert_eq!(handle.keys().await.unwrap(), vec!["shell-v0", CACHE_VERSION]);
        let index = handle.cached("/index.html").await.unwrap().unwrap();
        assert_eq!(index.tag, "shell-v0");
        assert_eq!(index.entry.data.body, b"old index");
    }

    #[tokio::test]
    async fn test_settle_waits_for_revalidation() {
        let (network, gate) = FakeNetwork::serving(&[("/", "fresh")]).gated();
        let storage = seeded(&[(CACHE_VERSION, "/", "seeded")]);
        let handle = spawn(ShellConfig::default(), storage, network);

        handle.fetch("/").await.unwrap();
        let settling = tokio::spawn({
            let handle = handle.clone();
            async move { handle.settle().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!settling.is_finished());

        gate.add_permits(1);
        settling.await.unwrap().unwrap();
        let hit = handle.cached("/").await.unwrap().unwrap();
        assert_eq!(hit.entry.data.body, b"fresh");
    }

    #[tokio::test]
    async fn test_settle_when_idle() {
        let handle = spawn(ShellConfig::default(), MemoryCacheStorage::new(), FakeNetwork::default());
        handle.settle().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_shell_paths_pass_through() {
        let network = FakeNetwork::serving(&[("/content/latest.json", "{}")]);
        let handle = spawn(ShellConfig::default(), MemoryCacheStorage::new(), network.clone());

        assert_eq!(
            handle.fetch("/content/latest.json").await.unwrap(),
            Intercept::PassThrough
        );
        assert_eq!(network.request_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate() {
        let (network, gate) = FakeNetwork::serving(&[("/", "fresh")]).gated();
        let storage = seeded(&[(CACHE_VERSION, "/", "seeded")]);
        let handle = spawn(ShellConfig::default(), storage, network);

        // The network is held shut, so this can only be answered from cache.
        let served = handle.fetch("/?utm=1").await.unwrap();
        assert_eq!(
            served,
            Intercept::Respond {
                response: ok("seeded"),
                source: ResponseSource::Cache,
            }
        );
        let hit = handle.cached("/").await.unwrap().unwrap();
        assert_eq!(hit.entry.data.body, b"seeded");

        gate.add_permits(1);
        assert!(wait_for_body(&handle, "/", "fresh").await);
    }

    #[tokio::test]
    async fn test_miss_waits_for_network_and_stores() {
        let network = FakeNetwork::serving(&[("/app.js", "console.log(1)")]);
        let handle = spawn(ShellConfig::default(), MemoryCacheStorage::new(), network);

        let served = handle.fetch("/app.js").await.unwrap();
        assert_eq!(
            served,
            Intercept::Respond {
                response: ok("console.log(1)"),
                source: ResponseSource::Network,
            }
        );
        // Stored before the reply was sent.
        let hit = handle.cached("/app.js").await.unwrap().unwrap();
        assert_eq!(hit.tag, CACHE_VERSION);
    }

    #[tokio::test]
    async fn test_miss_with_network_failure_errors() {
        let network = FakeNetwork::default();
        network.respond("/styles.css", Err("offline".to_string()));
        let handle = spawn(ShellConfig::default(), MemoryCacheStorage::new(), network);

        assert!(matches!(
            handle.fetch("/styles.css").await,
            Err(ShellError::Network { .. })
        ));
        assert!(handle.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_older_generation() {
        let (network, _gate) = FakeNetwork::default().gated();
        let storage = seeded(&[("shell-v0", "/index.html", "old index")]);
        let handle = spawn(ShellConfig::default(), storage, network);

        let served = handle.fetch("/index.html").await.unwrap();
        assert_eq!(
            served,
            Intercept::Respond {
                response: ok("old index"),
                source: ResponseSource::Cache,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_revalidation_keeps_cached_copy() {
        let network = FakeNetwork::default();
        network.respond("/", Err("offline".to_string()));
        let storage = seeded(&[(CACHE_VERSION, "/", "seeded")]);
        let handle = spawn(ShellConfig::default(), storage, network.clone());

        handle.fetch("/").await.unwrap();
        while network.request_count() == 0 {
            tokio::task::yield_now().await;
        }
        // Round-trip through the mailbox so the failed result has been handled.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let hit = handle.cached("/").await.unwrap().unwrap();
        assert_eq!(hit.entry.data.body, b"seeded");
    }

    #[tokio::test]
    async fn test_unsuccessful_responses_are_not_stored() {
        let network = FakeNetwork::default();
        network.respond("/manifest.json", Ok(ShellResponse::new(503, None, "busy")));
        let handle = spawn(ShellConfig::default(), MemoryCacheStorage::new(), network);

        match handle.fetch("/manifest.json").await.unwrap() {
            Intercept::Respond { response, source } => {
                assert_eq!(response.status, 503);
                assert_eq!(source, ResponseSource::Network);
            }
            other => panic!("unexpected intercept: {:?}", other),
        }
        assert!(handle.cached("/manifest.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_worker_lives_while_any_handle_does() {
        let handle = spawn(ShellConfig::default(), MemoryCacheStorage::new(), FakeNetwork::default());
        let clone = handle.clone();
        drop(handle);
        // A live clone keeps the worker running.
        assert!(clone.keys().await.unwrap().is_empty());
    }
}
