use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use log::error;
use log::info;

///////////////////////////////
/// Apply `f` to every path on a pool of `num_threads` threads. Every path is attempted;
/// the call fails afterwards if any of them failed or its thread died
pub fn run_per_file<F>(paths: Vec<PathBuf>, num_threads: usize, what: &str, f: F) -> anyhow::Result<()>
where
    F: Fn(&Path) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let num_total = paths.len();
    if num_total == 0 {
        info!("{}: nothing to do", what);
        return Ok(());
    }

    let f = Arc::new(f);
    let thread_pool = threadpool::ThreadPool::new(num_threads.max(1));
    let (tx_result, rx_result) = crossbeam::channel::unbounded::<(PathBuf, anyhow::Result<()>)>();

    for path in paths {
        let f = Arc::clone(&f);
        let tx_result = tx_result.clone();
        thread_pool.execute(move || {
            let result = f(&path);
            _ = tx_result.send((path, result));
        });
    }
    drop(tx_result);
    thread_pool.join();

    let mut num_ok = 0;
    for (path, result) in rx_result.iter() {
        match result {
            Ok(()) => {
                info!("{}: done with {}", what, path.display());
                num_ok += 1;
            }
            Err(e) => error!("{}: failed on {}: {:#}", what, path.display(), e),
        }
    }

    if num_ok < num_total {
        bail!("{} failed for {} of {} inputs", what, num_total - num_ok, num_total);
    }
    Ok(())
}
