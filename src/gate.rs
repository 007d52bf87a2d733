use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Rejection returned when another gated action is still in flight. Not a
/// failure: the caller shows the message and moves on.
#[derive(Debug, Clone, Error)]
#[error("Please wait. A request is already in progress: {in_flight}")]
pub struct Busy {
    pub in_flight: String,
}

/// Single-flight gate for the panel's long-running actions. Admission is
/// synchronous and there is no queue: a second action arriving while the
/// first is unresolved is rejected with the first one's description.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    slot: Arc<Mutex<Option<String>>>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject. The returned permit keeps the gate busy until it
    /// is dropped, on success, failure, cancellation and panic alike.
    pub fn try_begin(&self, description: &str) -> Result<GatePermit, Busy> {
        let mut slot = lock_slot(&self.slot);
        if let Some(in_flight) = slot.as_ref() {
            return Err(Busy {
                in_flight: in_flight.clone(),
            });
        }
        *slot = Some(description.to_string());
        Ok(GatePermit {
            slot: self.slot.clone(),
        })
    }

    /// Run `action` under the gate.
    pub async fn execute<F, T>(&self, description: &str, action: F) -> Result<T, Busy>
    where
        F: Future<Output = T>,
    {
        let permit = self.try_begin(description)?;
        let result = action.await;
        drop(permit);
        Ok(result)
    }

    /// Description of the in-flight action, if any.
    pub fn in_flight(&self) -> Option<String> {
        lock_slot(&self.slot).clone()
    }
}

/// Owned busy marker; clearing happens in `Drop` so every exit path
/// releases the gate.
#[derive(Debug)]
pub struct GatePermit {
    slot: Arc<Mutex<Option<String>>>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        *lock_slot(&self.slot) = None;
    }
}

fn lock_slot(slot: &Mutex<Option<String>>) -> std::sync::MutexGuard<'_, Option<String>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn rejects_while_a_permit_is_held() {
        let gate = RequestGate::new();
        let permit = gate.try_begin("Fetching video summary").unwrap();

        let busy = gate.try_begin("Fetching video notes").unwrap_err();
        assert_eq!(busy.in_flight, "Fetching video summary");
        assert_eq!(gate.in_flight().as_deref(), Some("Fetching video summary"));

        drop(permit);
        assert!(gate.try_begin("Fetching video notes").is_ok());
    }

    #[tokio::test]
    async fn second_concurrent_action_is_rejected_synchronously() {
        let gate = RequestGate::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = gate.execute("Fetching video summary", async move {
            release_rx.await.ok();
            "summary"
        });
        tokio::pin!(first);

        // Poll the first action once so it holds the gate, then try the
        // second.
        tokio::select! {
            biased;
            _ = &mut first => panic!("first action must still be waiting"),
            result = gate.execute("Processing your query", async { "answer" }) => {
                let busy = result.unwrap_err();
                assert_eq!(busy.in_flight, "Fetching video summary");
            }
        }

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), "summary");
    }

    #[tokio::test]
    async fn gate_clears_after_a_failed_action() {
        let gate = RequestGate::new();
        let result: Result<Result<(), &str>, Busy> = gate
            .execute("Fetching video notes", async { Err("boom") })
            .await;
        assert!(result.unwrap().is_err());
        assert!(gate.in_flight().is_none());
        assert!(gate.try_begin("Fetching video notes").is_ok());
    }

    #[tokio::test]
    async fn gate_clears_when_an_action_is_cancelled() {
        let gate = RequestGate::new();
        {
            let pending = gate.execute("Processing audio translation", std::future::pending::<()>());
            tokio::pin!(pending);
            // One poll admits the action; dropping the future cancels it.
            tokio::select! {
                biased;
                _ = &mut pending => unreachable!(),
                _ = std::future::ready(()) => {}
            }
        }
        assert!(gate.in_flight().is_none());
    }
}
