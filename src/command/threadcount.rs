use log::warn;

/// Worker threads for the caller. Explicit counts must be at least 1; otherwise half of
/// the available parallelism, since every worker drives a multi-threaded JVM
pub fn determine_worker_count(total: Option<usize>) -> anyhow::Result<usize> {
    if let Some(total) = total {
        some_min1(Some(total))
    } else {
        match std::thread::available_parallelism() {
            Ok(total) => anyhow::Ok(min1(total.get() / 2)),
            Err(_) => {
                warn!("Could not autodetect the number of threads available. Setting to 1, but it is better if you specify");
                anyhow::Ok(1)
            }
        }
    }
}

/// Threads for the per-file tools, default 1
pub fn determine_thread_count(total: Option<usize>) -> anyhow::Result<usize> {
    some_min1(total)
}

pub fn some_min1(t: Option<usize>) -> anyhow::Result<usize> {
    if let Some(t) = t {
        if t < 1 {
            anyhow::bail!("Number of threads must be at least 1")
        } else {
            anyhow::Ok(t)
        }
    } else {
        anyhow::Ok(1)
    }
}

pub fn min1(t: usize) -> usize {
    if t < 1 {
        1
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_counts_are_kept() {
        assert_eq!(determine_worker_count(Some(6)).unwrap(), 6);
        assert!(determine_worker_count(Some(0)).is_err());
    }

    #[test]
    fn autodetected_count_is_at_least_one() {
        assert!(determine_worker_count(None).unwrap() >= 1);
        assert_eq!(determine_thread_count(None).unwrap(), 1);
    }
}
