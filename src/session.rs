//! Async session tying the workflow, history and remote service together
//!
//! Submissions run on spawned tasks bounded by the request timeout. Outcomes
//! come back over a channel and are applied on the session owner's task, so
//! the workflow itself is never shared between tasks.

use crate::client::{InpaintOutput, InpaintService};
use crate::config::InpaintConfig;
use crate::error::{InpaintError, Result};
use crate::history::{HistoryEntry, HistoryStore};
use crate::tracing_config::events;
use crate::types::JobId;
use crate::workflow::{Completion, SubmissionRequest, SubmissionTicket, Workflow, WorkflowSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

type CompletionMessage = (SubmissionRequest, Result<InpaintOutput>);

/// One user's authoring session against a remote service
pub struct InpaintSession<S: InpaintService + ?Sized + 'static = dyn InpaintService> {
    workflow: Workflow,
    history: HistoryStore,
    service: Arc<S>,
    timeout: Duration,
    completions_tx: mpsc::UnboundedSender<CompletionMessage>,
    completions_rx: mpsc::UnboundedReceiver<CompletionMessage>,
    snapshots: watch::Sender<WorkflowSnapshot>,
    in_flight: usize,
}

impl<S: InpaintService + ?Sized + 'static> InpaintSession<S> {
    #[must_use]
    pub fn new(service: Arc<S>, config: &InpaintConfig) -> Self {
        let workflow = Workflow::new(config);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(workflow.snapshot());

        Self {
            workflow,
            history: HistoryStore::with_capacity(config.history_capacity),
            service,
            timeout: config.request_timeout(),
            completions_tx,
            completions_rx,
            snapshots,
            in_flight: 0,
        }
    }

    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    #[must_use]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    #[must_use]
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Submissions spawned but not yet applied
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Observe workflow snapshots published after every change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.snapshots.subscribe()
    }

    /// Run a workflow transition and publish the resulting snapshot
    pub fn apply<R>(&mut self, f: impl FnOnce(&mut Workflow) -> R) -> R {
        let result = f(&mut self.workflow);
        self.publish();
        result
    }

    /// Restore a history entry by id
    pub fn select_history(&mut self, id: &JobId) -> Result<Arc<HistoryEntry>> {
        let entry = self
            .history
            .select(id)
            .ok_or_else(|| InpaintError::precondition(format!("No history entry with id {}", id)))?;
        self.apply(|workflow| workflow.select_history(&entry));
        Ok(entry)
    }

    /// Begin a submission and send it to the service in the background
    pub fn start_submission(&mut self) -> Result<SubmissionTicket> {
        let request = self.apply(Workflow::begin_submission)?;
        let ticket = request.ticket;

        let service = Arc::clone(&self.service);
        let tx = self.completions_tx.clone();
        let timeout = self.timeout;
        debug!(
            service = service.name(),
            sequence = ticket.sequence(),
            "Spawning submission"
        );

        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, service.submit(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(InpaintError::Timeout(timeout)),
            };
            if tx.send((request, outcome)).is_err() {
                debug!("Session dropped before submission completed");
            }
        });

        self.in_flight += 1;
        Ok(ticket)
    }

    /// Wait for the next outstanding submission and apply it
    pub async fn wait_for_completion(&mut self) -> Result<Completion> {
        if self.in_flight == 0 {
            return Err(InpaintError::precondition("No submission is outstanding"));
        }
        let (request, outcome) = self
            .completions_rx
            .recv()
            .await
            .ok_or_else(|| InpaintError::internal("Completion channel closed"))?;
        self.apply_completion(&request, outcome)
    }

    /// Apply every completion that has already arrived, without waiting
    pub fn poll_completions(&mut self) -> Vec<Completion> {
        let mut applied = Vec::new();
        while let Ok((request, outcome)) = self.completions_rx.try_recv() {
            match self.apply_completion(&request, outcome) {
                Ok(completion) => applied.push(completion),
                Err(e) => events::error_with_context(&e, "Applying submission outcome"),
            }
        }
        applied
    }

    /// Submit and wait until that submission's outcome has been applied
    ///
    /// Completions of earlier detached submissions that arrive first are
    /// applied along the way.
    pub async fn submit_and_wait(&mut self) -> Result<Completion> {
        let ticket = self.start_submission()?;
        loop {
            let (request, outcome) = self
                .completions_rx
                .recv()
                .await
                .ok_or_else(|| InpaintError::internal("Completion channel closed"))?;
            let ours = request.ticket == ticket;
            let completion = self.apply_completion(&request, outcome)?;
            if ours {
                return Ok(completion);
            }
        }
    }

    fn apply_completion(
        &mut self,
        request: &SubmissionRequest,
        outcome: Result<InpaintOutput>,
    ) -> Result<Completion> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let completion = self.workflow.complete_submission(request, outcome)?;
        if let Completion::Succeeded { entry, .. } = &completion {
            let entry = self.history.append(entry.clone());
            info!(job_id = %entry.id, history_len = self.history.len(), "Result recorded");
        }
        self.publish();
        Ok(completion)
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.workflow.snapshot());
    }
}

impl<S: InpaintService + ?Sized + 'static> std::fmt::Debug for InpaintSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InpaintSession")
            .field("stage", &self.workflow.stage())
            .field("history_len", &self.history.len())
            .field("in_flight", &self.in_flight)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
