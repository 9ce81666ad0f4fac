use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::CampaignId;
use super::repository::RepositoryError;

/// Per-campaign mutexes serializing every transition that changes fund reservation.
#[derive(Debug, Default)]
pub struct ReservationLocks {
    locks: Mutex<HashMap<CampaignId, Arc<Mutex<()>>>>,
}

impl ReservationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the campaign's reservation lock.
    pub fn with_campaign<T, E>(
        &self,
        campaign_id: &CampaignId,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| poisoned())?;
            locks.entry(campaign_id.clone()).or_default().clone()
        };
        let _guard = lock.lock().map_err(|_| poisoned())?;
        f()
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("reservation lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn serializes_work_per_campaign() {
        let locks = Arc::new(ReservationLocks::new());
        let in_section = Arc::new(AtomicU32::new(0));
        let overlaps = Arc::new(AtomicU32::new(0));
        let campaign = CampaignId::from("cmp-1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let in_section = in_section.clone();
                let overlaps = overlaps.clone();
                let campaign = campaign.clone();
                thread::spawn(move || {
                    locks
                        .with_campaign(&campaign, || {
                            if in_section.fetch_add(1, Ordering::SeqCst) > 0 {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::yield_now();
                            in_section.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, RepositoryError>(())
                        })
                        .expect("lock acquired");
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread finished");
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
