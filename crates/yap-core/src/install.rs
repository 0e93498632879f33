//! The install orchestrator: a three-stage concurrent pipeline (resolve →
//! download → materialize) with duplicate suppression and a lockfile
//! fast-path.
//!
//! Grounded on the recovered upstream's `src/install/install.go`
//! (`InstallPackages`/`ResolvePackageMetadata`/`DownloadPackageTarball`):
//! two worker pools draining two queues, a shared visited map guarding
//! against re-resolving the same package twice, and `sync.WaitGroup`-style
//! barriers tracking outstanding work per stage. The Go source spawns
//! goroutines over unbuffered channels and closes them once its wait groups
//! drain; a channel only disconnects once every sender drops, and here the
//! worker threads themselves must hold a sender to forward newly discovered
//! dependencies, so closing can't be modeled by dropping senders without
//! deadlocking. Each worker instead polls its queue with a timeout and exits
//! once the orchestrator flips a shutdown flag after its barrier reaches
//! zero — the same "wait until nothing is outstanding, then stop taking
//! more work" shape, expressed without relying on channel teardown.
//!
//! One addition beyond the recovered source: the Go `installedPackages` map
//! is keyed once, pre-resolution, by `name@spec`, so two different specs
//! that resolve to the same concrete version are downloaded twice. Here a
//! second visited key, `name@resolved-version`, is inserted after
//! resolution so that case collapses onto a single download.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use dashmap::DashMap;

use crate::error::Result;
use crate::types::{Config, Lockfile, MPackage, PackageRef};
use crate::{downloader, fetcher, lockfile as lockfile_io, materializer};

const DEFAULT_WORKERS: usize = 200;
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn worker_count() -> usize {
    std::env::var("YAP_INSTALL_WORKERS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_WORKERS)
}

fn spec_key(name: &str, spec: &str) -> String {
    format!("spec:{name}@{spec}")
}

fn version_key(name: &str, version: &str) -> String {
    format!("version:{name}@{version}")
}

/// A wait-group style counter: `add`/`done` mutate it, `wait_zero` blocks
/// until it reaches zero. Stands in for the Go source's `sync.WaitGroup`.
struct Barrier {
    count: Mutex<i64>,
    changed: Condvar,
}

impl Barrier {
    fn new() -> Self {
        Barrier {
            count: Mutex::new(0),
            changed: Condvar::new(),
        }
    }

    fn add(&self, n: i64) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count += n;
        if *count <= 0 {
            self.changed.notify_all();
        }
    }

    fn done(&self) {
        self.add(-1);
    }

    fn wait_zero(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count > 0 {
            count = self.changed.wait(count).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Six counters (resolve/download/move, each done+total), protected by a
/// mutex and printed on every increment. Mirrors the recovered upstream's
/// `logger.Stats`, extended with a "move" (materialize) pair the Go source
/// never tracked since its hardlink step was never wired into the pipeline.
#[derive(Default)]
struct Counts {
    resolve_done: u64,
    resolve_total: u64,
    download_done: u64,
    download_total: u64,
    move_done: u64,
    move_total: u64,
}

struct Stats(Mutex<Counts>);

impl Stats {
    fn new() -> Self {
        Stats(Mutex::new(Counts::default()))
    }

    fn bump(&self, f: impl FnOnce(&mut Counts)) {
        let mut c = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut c);
        crate::log::log(&format!(
            "[STATS] resolve {}/{} download {}/{} move {}/{}",
            c.resolve_done, c.resolve_total, c.download_done, c.download_total, c.move_done, c.move_total
        ));
    }

    fn bump_resolve_total(&self) {
        self.bump(|c| c.resolve_total += 1);
    }
    fn bump_resolve_done(&self) {
        self.bump(|c| c.resolve_done += 1);
    }
    fn bump_download_total(&self) {
        self.bump(|c| c.download_total += 1);
    }
    fn bump_download_done(&self) {
        self.bump(|c| c.download_done += 1);
    }
    fn bump_move_total(&self) {
        self.bump(|c| c.move_total += 1);
    }
    fn bump_move_done(&self) {
        self.bump(|c| c.move_done += 1);
    }
}

/// Shared state threaded through every worker closure.
struct Shared {
    visited: DashMap<String, ()>,
    lockfile: Mutex<Lockfile>,
    stats: Stats,
    meta_barrier: Barrier,
    dl_barrier: Barrier,
}

/// Runs the full install pipeline for `core_deps` against `project_root`.
///
/// If `force` is false and `yap.lockb` already exists, the metadata stage is
/// skipped entirely: every resolution in the lockfile is fed straight to the
/// download stage (step 1 of the protocol). Otherwise `core_deps` seeds the
/// metadata stage and a fresh lockfile is written on completion (step 2).
pub fn run_pipeline(
    project_root: &Path,
    config: &Config,
    force: bool,
    core_deps: Vec<PackageRef>,
) -> Result<Lockfile> {
    let shared = Arc::new(Shared {
        visited: DashMap::new(),
        lockfile: Mutex::new(Lockfile::default()),
        stats: Stats::new(),
        meta_barrier: Barrier::new(),
        dl_barrier: Barrier::new(),
    });

    let (meta_tx, meta_rx) = mpsc::channel::<PackageRef>();
    let (dl_tx, dl_rx) = mpsc::channel::<MPackage>();
    let meta_rx = Arc::new(Mutex::new(meta_rx));
    let dl_rx = Arc::new(Mutex::new(dl_rx));

    let meta_shutdown = Arc::new(AtomicBool::new(false));
    let dl_shutdown = Arc::new(AtomicBool::new(false));

    let existing_lockfile = if force {
        None
    } else {
        lockfile_io::read_lockfile(project_root)?
    };

    let rewrite_lockfile = match existing_lockfile {
        Some(existing) => {
            seed_from_lockfile(&existing, &shared, &dl_tx);
            false
        }
        None => {
            seed_from_core_deps(&core_deps, &shared, &meta_tx);
            true
        }
    };

    let n_workers = worker_count();
    crate::log::log(&format!("[INSTALL] starting with {n_workers} workers per stage"));

    let mut meta_handles = Vec::with_capacity(n_workers);
    for _ in 0..n_workers {
        let shared = Arc::clone(&shared);
        let meta_rx = Arc::clone(&meta_rx);
        let meta_tx = meta_tx.clone();
        let dl_tx = dl_tx.clone();
        let config = config.clone();
        let shutdown = Arc::clone(&meta_shutdown);
        meta_handles.push(thread::spawn(move || {
            meta_worker_loop(&shared, &meta_rx, &meta_tx, &dl_tx, &config, &shutdown);
        }));
    }

    let mut dl_handles = Vec::with_capacity(n_workers);
    for _ in 0..n_workers {
        let shared = Arc::clone(&shared);
        let dl_rx = Arc::clone(&dl_rx);
        let config = config.clone();
        let project_root = project_root.to_path_buf();
        let shutdown = Arc::clone(&dl_shutdown);
        dl_handles.push(thread::spawn(move || {
            dl_worker_loop(&shared, &dl_rx, &config, &project_root, &shutdown);
        }));
    }

    shared.meta_barrier.wait_zero();
    meta_shutdown.store(true, Ordering::Release);
    for handle in meta_handles {
        let _ = handle.join();
    }

    shared.dl_barrier.wait_zero();
    dl_shutdown.store(true, Ordering::Release);
    for handle in dl_handles {
        let _ = handle.join();
    }

    let final_lockfile = shared
        .lockfile
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();

    if rewrite_lockfile {
        lockfile_io::write_lockfile(project_root, &final_lockfile)?;
    }

    crate::log::log("[INSTALL] done");
    Ok(final_lockfile)
}

fn seed_from_core_deps(core_deps: &[PackageRef], shared: &Shared, meta_tx: &Sender<PackageRef>) {
    {
        let mut lf = shared.lockfile.lock().unwrap_or_else(|e| e.into_inner());
        lf.core_dependencies = core_deps.to_vec();
    }
    for pkg in core_deps {
        if shared.visited.insert(spec_key(&pkg.name, &pkg.spec), ()).is_none() {
            shared.meta_barrier.add(1);
            shared.stats.bump_resolve_total();
            let _ = meta_tx.send(pkg.clone());
        }
    }
}

fn seed_from_lockfile(existing: &Lockfile, shared: &Shared, dl_tx: &Sender<MPackage>) {
    {
        let mut lf = shared.lockfile.lock().unwrap_or_else(|e| e.into_inner());
        lf.core_dependencies = existing.core_dependencies.clone();
    }
    for mpkg in &existing.resolutions {
        shared.visited.insert(version_key(&mpkg.name, &mpkg.version), ());
        shared.dl_barrier.add(1);
        shared.stats.bump_download_total();
        shared.stats.bump_move_total();
        let _ = dl_tx.send(mpkg.clone());
    }
}

fn meta_worker_loop(
    shared: &Shared,
    meta_rx: &Mutex<Receiver<PackageRef>>,
    meta_tx: &Sender<PackageRef>,
    dl_tx: &Sender<MPackage>,
    config: &Config,
    shutdown: &AtomicBool,
) {
    loop {
        let next = {
            let rx = meta_rx.lock().unwrap_or_else(|e| e.into_inner());
            rx.recv_timeout(WORKER_POLL_INTERVAL)
        };
        let pkg = match next {
            Ok(pkg) => pkg,
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Acquire) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };

        resolve_one(shared, &pkg, meta_tx, dl_tx, config);
        shared.meta_barrier.done();
    }
}

fn resolve_one(shared: &Shared, pkg: &PackageRef, meta_tx: &Sender<PackageRef>, dl_tx: &Sender<MPackage>, config: &Config) {
    crate::log::log(&format!("[METADATA] resolving {}@{}", pkg.name, pkg.spec));

    let vmd = match fetcher::fetch_version_metadata(pkg, config, false) {
        Ok(vmd) => vmd,
        Err(e) => {
            crate::log::log_error(&format!("[METADATA] {}@{}: {e}", pkg.name, pkg.spec));
            shared.stats.bump_resolve_done();
            return;
        }
    };
    shared.stats.bump_resolve_done();

    if shared
        .visited
        .insert(version_key(&vmd.name, &vmd.version), ())
        .is_some()
    {
        // Already downloading or downloaded under a different spec; its
        // dependencies were already traversed the first time this version
        // was reached, since dependencies are a pure function of name+version.
        return;
    }

    let mpkg = MPackage {
        name: vmd.name.clone(),
        version: vmd.version.clone(),
        dist: vmd.dist.clone(),
        dependencies: vec![],
    };
    shared.dl_barrier.add(1);
    shared.stats.bump_download_total();
    shared.stats.bump_move_total();
    let _ = dl_tx.send(mpkg);

    for (dep_name, dep_spec) in &vmd.dependencies {
        if shared.visited.insert(spec_key(dep_name, dep_spec), ()).is_none() {
            shared.meta_barrier.add(1);
            shared.stats.bump_resolve_total();
            let _ = meta_tx.send(PackageRef::new(dep_name.clone(), dep_spec.clone()));
        }
    }
}

fn dl_worker_loop(
    shared: &Shared,
    dl_rx: &Mutex<Receiver<MPackage>>,
    config: &Config,
    project_root: &Path,
    shutdown: &AtomicBool,
) {
    loop {
        let next = {
            let rx = dl_rx.lock().unwrap_or_else(|e| e.into_inner());
            rx.recv_timeout(WORKER_POLL_INTERVAL)
        };
        let mpkg = match next {
            Ok(mpkg) => mpkg,
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Acquire) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };

        download_one(shared, &mpkg, config, project_root);
        shared.dl_barrier.done();
    }
}

fn download_one(shared: &Shared, mpkg: &MPackage, config: &Config, project_root: &Path) {
    crate::log::log(&format!("[TARBALL] downloading {}@{}", mpkg.name, mpkg.version));

    if let Err(e) = downloader::download_package(&mpkg.name, &mpkg.version, &mpkg.dist.tarball, config, false) {
        crate::log::log_error(&format!("[TARBALL] {}@{}: {e}", mpkg.name, mpkg.version));
        return;
    }
    shared.stats.bump_download_done();

    if let Err(e) = materializer::install_to_project(&mpkg.name, &mpkg.version, project_root) {
        crate::log::log_error(&format!("[SHIP] {}@{}: {e}", mpkg.name, mpkg.version));
        return;
    }
    shared.stats.bump_move_done();

    let mut lf = shared.lockfile.lock().unwrap_or_else(|e| e.into_inner());
    lf.resolutions.push(mpkg.clone());
}

/// Installs from `<project_root>/package.json`'s merged dependencies, honoring
/// the lockfile fast-path unless `force` is set.
pub fn install(project_root: &Path, config: &Config, force: bool) -> Result<Lockfile> {
    let pkg_json = crate::manifest::read_package_json(project_root)?;
    let core_deps = crate::manifest::merged_dependencies(&pkg_json);
    run_pipeline(project_root, config, force, core_deps)
}

/// Resolves and installs a single additional package, on top of whatever is
/// already declared (in the lockfile if present, else `package.json`).
/// Thin CLI glue atop `run_pipeline`: always re-resolves, since the whole
/// point of `add` is to bring in something the lockfile doesn't have yet.
pub fn add_package(project_root: &Path, config: &Config, pkg: PackageRef) -> Result<Lockfile> {
    let mut core_deps = match lockfile_io::read_lockfile(project_root)? {
        Some(existing) => existing.core_dependencies,
        None => {
            let pkg_json = crate::manifest::read_package_json(project_root)?;
            crate::manifest::merged_dependencies(&pkg_json)
        }
    };

    match core_deps.iter_mut().find(|p| p.name == pkg.name) {
        Some(existing) => existing.spec = pkg.spec,
        None => core_deps.push(pkg),
    }

    run_pipeline(project_root, config, true, core_deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_wait_zero_returns_immediately_when_never_incremented() {
        let barrier = Barrier::new();
        barrier.wait_zero();
    }

    #[test]
    fn barrier_tracks_add_and_done() {
        let barrier = Arc::new(Barrier::new());
        barrier.add(2);
        let b2 = Arc::clone(&barrier);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            b2.done();
            b2.done();
        });
        barrier.wait_zero();
        handle.join().unwrap();
    }

    #[test]
    fn worker_count_honors_env_override() {
        std::env::set_var("YAP_INSTALL_WORKERS", "7");
        assert_eq!(worker_count(), 7);
        std::env::remove_var("YAP_INSTALL_WORKERS");
    }

    #[test]
    fn worker_count_defaults_to_two_hundred() {
        std::env::remove_var("YAP_INSTALL_WORKERS");
        assert_eq!(worker_count(), DEFAULT_WORKERS);
    }

    #[test]
    fn empty_project_produces_empty_lockfile() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("YAP_STORE_DIR", dir.path().join("store"));
        std::env::set_var("YAP_INSTALL_WORKERS", "4");
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();

        let config = Config::default();
        let lockfile = install(dir.path(), &config, false).unwrap();
        assert!(lockfile.core_dependencies.is_empty());
        assert!(lockfile.resolutions.is_empty());

        std::env::remove_var("YAP_STORE_DIR");
        std::env::remove_var("YAP_INSTALL_WORKERS");
    }
}
