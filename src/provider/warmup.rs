use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Run `work` over `items` on up to `workers` scoped threads.
///
/// Results come back in input order. Workers pull small batches from a shared
/// queue so slow items do not stall a fixed partition.
pub(crate) fn parallel_map<T, R, F>(items: Vec<T>, workers: usize, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let worker_count = workers.min(items.len()).max(1);
    let total = items.len();
    let queue = Arc::new(Mutex::new(
        items.into_iter().enumerate().collect::<VecDeque<_>>(),
    ));
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let work = &work;
            scope.spawn(move || {
                loop {
                    let batch = {
                        let mut guard = match queue.lock() {
                            Ok(guard) => guard,
                            Err(_) => return,
                        };
                        drain_batch(&mut guard, WARM_UP_BATCH_MAX)
                    };
                    if batch.is_empty() {
                        break;
                    }
                    for (position, item) in batch {
                        if tx.send((position, work(&item))).is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for (position, result) in rx {
        slots[position] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

const WARM_UP_BATCH_MAX: usize = 8;

fn drain_batch<T>(queue: &mut VecDeque<T>, max: usize) -> Vec<T> {
    let take = queue.len().min(max);
    queue.drain(..take).collect()
}

/// Default worker count: available parallelism, at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_map_preserves_input_order() {
        let items: Vec<usize> = (0..100).collect();
        let out = parallel_map(items, 4, |v| v * 2);
        assert_eq!(out, (0..100).map(|v| v * 2).collect::<Vec<_>>());
    }

    #[test]
    fn parallel_map_handles_empty_and_single_worker() {
        let out: Vec<usize> = parallel_map(Vec::<usize>::new(), 4, |v| *v);
        assert!(out.is_empty());
        assert_eq!(parallel_map(vec![1, 2, 3], 0, |v| v + 1), vec![2, 3, 4]);
    }
}
