use crate::core::events::JobEvent;
use crate::core::model::JobId;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Ordered, non-blocking handoff of one job's events to its consumer.
pub fn delivery_channel(job_id: JobId) -> (DeliverySender, DeliveryReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DeliverySender { job_id, tx }, DeliveryReceiver { rx, pending: None })
}

#[derive(Clone)]
pub struct DeliverySender {
    job_id: JobId,
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl DeliverySender {
    /// Never blocks and never fails; events for a departed consumer are dropped.
    pub fn send(&self, event: JobEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!(job_id = %self.job_id, "consumer gone, event dropped");
        }
    }
}

pub struct DeliveryReceiver {
    rx: mpsc::UnboundedReceiver<JobEvent>,
    pending: Option<JobEvent>,
}

impl DeliveryReceiver {
    pub async fn recv(&mut self) -> Option<JobEvent> {
        if let Some(ev) = self.pending.take() {
            return Some(ev);
        }
        self.rx.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        if let Some(ev) = self.pending.take() {
            return Some(ev);
        }
        match self.rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits for the next event, then skips to the newest queued progress
    /// event. A terminal event is held back and returned by the next call.
    pub async fn recv_coalesced(&mut self) -> Option<JobEvent> {
        let mut current = self.recv().await?;
        while !current.is_terminal() {
            match self.rx.try_recv() {
                Ok(next) if !next.is_terminal() => current = next,
                Ok(terminal) => {
                    self.pending = Some(terminal);
                    break;
                }
                Err(_) => break,
            }
        }
        Some(current)
    }
}
