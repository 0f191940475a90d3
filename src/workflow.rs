//! Workflow state machine gating authoring and processing actions
//!
//! Four stages run in sequence: upload, mark, configure, result. All mutation
//! goes through the named transitions below; each one checks that it is legal
//! from the current stage and that the image and mask it depends on exist.

use crate::client::InpaintOutput;
use crate::config::InpaintConfig;
use crate::coords::ImagePoint;
use crate::error::{InpaintError, Result};
use crate::history::HistoryEntry;
use crate::mask::MaskRaster;
use crate::stroke::{StrokeEngine, StrokeSummary};
use crate::types::{BrushRadius, ImagePayload, IterationCount, JobId, ResultImage, Tool};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notice surfaced when a remote submission fails
pub const SUBMISSION_FAILED_NOTICE: &str = "Inpainting failed. Please try again.";

/// The single active stage of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStage {
    /// Waiting for an image
    Upload,
    /// Authoring the removal mask
    Mark,
    /// Choosing the iteration count before submission
    Configure,
    /// Processing indicator or completed output
    Result,
}

impl WorkflowStage {
    pub const ALL: [Self; 4] = [Self::Upload, Self::Mark, Self::Configure, Self::Result];

    /// One-based position on the progress rail
    #[must_use]
    pub fn step_number(self) -> u8 {
        match self {
            Self::Upload => 1,
            Self::Mark => 2,
            Self::Configure => 3,
            Self::Result => 4,
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Upload => "Upload Image",
            Self::Mark => "Draw Mask",
            Self::Configure => "Configure",
            Self::Result => "View Result",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Upload => "Start by uploading the image you want to edit",
            Self::Mark => "Draw over the objects you want to remove from the image",
            Self::Configure => "Adjust settings for optimal results",
            Self::Result => "Review the inpainted image",
        }
    }

    /// Status of `step` on the progress rail while `self` is active
    #[must_use]
    pub fn step_status(self, step: Self) -> StepStatus {
        match step.step_number().cmp(&self.step_number()) {
            std::cmp::Ordering::Less => StepStatus::Completed,
            std::cmp::Ordering::Equal => StepStatus::Active,
            std::cmp::Ordering::Greater => StepStatus::Pending,
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "Upload"),
            Self::Mark => write!(f, "Mark"),
            Self::Configure => write!(f, "Configure"),
            Self::Result => write!(f, "Result"),
        }
    }
}

/// Progress rail status of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Active,
    Pending,
}

/// Correlates a remote response with the request that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionTicket {
    generation: u64,
    sequence: u64,
}

impl SubmissionTicket {
    #[must_use]
    pub fn sequence(self) -> u64 {
        self.sequence
    }
}

/// Everything sent to the service for one submission
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub ticket: SubmissionTicket,
    pub image: Arc<ImagePayload>,
    pub mask: Arc<MaskRaster>,
    pub iterations: IterationCount,
}

/// Effect of applying a finished submission
#[derive(Debug)]
pub enum Completion {
    /// The service returned a result; the entry belongs in history
    Succeeded {
        entry: HistoryEntry,
        /// Whether the result was applied to the current session
        current: bool,
    },
    /// Transport failure or timeout; nothing belongs in history
    Failed {
        error: InpaintError,
        current: bool,
    },
}

/// Cheap view of the workflow for observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub stage: WorkflowStage,
    pub processing: bool,
    pub has_image: bool,
    pub has_mask: bool,
    pub has_result: bool,
    pub iterations: IterationCount,
    pub job_id: Option<JobId>,
    pub notice: Option<String>,
}

/// Orchestrates upload, authoring, configuration and result display
#[derive(Debug)]
pub struct Workflow {
    stage: WorkflowStage,
    image: Option<Arc<ImagePayload>>,
    engine: Option<StrokeEngine>,
    mask: Option<Arc<MaskRaster>>,
    result: Option<Arc<ResultImage>>,
    job_id: Option<JobId>,
    iterations: IterationCount,
    processing: Option<SubmissionTicket>,
    // Sequences handed out by begin_submission and not yet completed
    pending: HashSet<u64>,
    generation: u64,
    next_sequence: u64,
    notice: Option<String>,
    canvas_bounds: (u32, u32),
    default_radius: BrushRadius,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new(&InpaintConfig::default())
    }
}

impl Workflow {
    #[must_use]
    pub fn new(config: &InpaintConfig) -> Self {
        Self {
            stage: WorkflowStage::Upload,
            image: None,
            engine: None,
            mask: None,
            result: None,
            job_id: None,
            iterations: IterationCount::new(config.default_iterations),
            processing: None,
            pending: HashSet::new(),
            generation: 0,
            next_sequence: 0,
            notice: None,
            canvas_bounds: config.canvas_bounds(),
            default_radius: BrushRadius::new(config.default_brush_radius),
        }
    }

    #[must_use]
    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    #[must_use]
    pub fn image(&self) -> Option<&Arc<ImagePayload>> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn mask(&self) -> Option<&Arc<MaskRaster>> {
        self.mask.as_ref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&Arc<ResultImage>> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    #[must_use]
    pub fn iterations(&self) -> IterationCount {
        self.iterations
    }

    /// The stroke engine, present once an image is loaded for authoring
    #[must_use]
    pub fn engine(&self) -> Option<&StrokeEngine> {
        self.engine.as_ref()
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.is_some()
    }

    /// Last user-visible failure notice, cleared by the next transition
    #[must_use]
    pub fn last_notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Whether the "continue to settings" action is enabled
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.stage == WorkflowStage::Mark
            && !self.is_processing()
            && !self.is_stroking()
            && self.image.is_some()
            && self.mask.is_some()
    }

    /// Whether the "start inpainting" action is enabled
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.stage == WorkflowStage::Configure
            && !self.is_processing()
            && !self.is_stroking()
            && self.image.is_some()
            && self.mask.is_some()
    }

    #[must_use]
    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            stage: self.stage,
            processing: self.is_processing(),
            has_image: self.image.is_some(),
            has_mask: self.mask.is_some(),
            has_result: self.result.is_some(),
            iterations: self.iterations,
            job_id: self.job_id.clone(),
            notice: self.notice.clone(),
        }
    }

    /// Upload -> Mark, once the image has been decoded
    pub fn load_image(&mut self, payload: ImagePayload) -> Result<()> {
        self.expect_stage(&[WorkflowStage::Upload], "load an image")?;

        let engine = StrokeEngine::new(payload.image(), self.canvas_bounds, self.default_radius);
        let (width, height) = payload.dimensions();
        info!(
            width,
            height,
            mime = payload.mime(),
            canvas = ?engine.dimensions(),
            "Image loaded"
        );

        self.mask = engine.mask();
        self.engine = Some(engine);
        self.image = Some(Arc::new(payload));
        self.result = None;
        self.job_id = None;
        self.notice = None;
        self.generation += 1;
        self.transition(WorkflowStage::Mark);
        Ok(())
    }

    /// Decode `bytes` and load them; a decode failure leaves the workflow untouched
    pub fn load_image_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.expect_stage(&[WorkflowStage::Upload], "load an image")?;
        let payload = ImagePayload::from_bytes(bytes)?;
        self.load_image(payload)
    }

    /// Mark -> Configure; requires a decoded image and a non-empty mask
    pub fn advance_to_configure(&mut self) -> Result<()> {
        self.expect_stage(&[WorkflowStage::Mark], "continue to settings")?;
        self.expect_idle("continue to settings")?;
        self.expect_no_open_stroke("continue to settings")?;
        if self.image.is_none() {
            return Err(InpaintError::precondition("No image has been loaded"));
        }
        if self.mask.is_none() {
            return Err(InpaintError::EmptyMask);
        }
        self.notice = None;
        self.transition(WorkflowStage::Configure);
        Ok(())
    }

    /// Configure or Result -> Mark
    pub fn edit_mask(&mut self) -> Result<()> {
        self.expect_stage(
            &[WorkflowStage::Configure, WorkflowStage::Result],
            "edit the mask",
        )?;
        self.expect_idle("edit the mask")?;
        let image = self
            .image
            .clone()
            .ok_or_else(|| InpaintError::precondition("No image has been loaded"))?;

        // Restored history entries carry no canvas; start a fresh one
        let engine = self.engine.get_or_insert_with(|| {
            StrokeEngine::new(image.image(), self.canvas_bounds, self.default_radius)
        });
        engine.set_enabled(true);
        self.notice = None;
        self.transition(WorkflowStage::Mark);
        Ok(())
    }

    /// Result -> Configure, to resubmit with different settings
    pub fn change_settings(&mut self) -> Result<()> {
        self.expect_stage(&[WorkflowStage::Result], "change settings")?;
        self.expect_idle("change settings")?;
        self.expect_image_and_mask()?;
        self.notice = None;
        self.transition(WorkflowStage::Configure);
        Ok(())
    }

    /// Any stage -> Upload, discarding image, mask and result unconditionally
    ///
    /// An outstanding submission is detached: it still completes, but its
    /// result no longer touches this session's stage.
    pub fn new_image(&mut self) {
        if let Some(ticket) = self.processing.take() {
            debug!(sequence = ticket.sequence, "Detaching outstanding submission");
        }
        self.image = None;
        self.engine = None;
        self.mask = None;
        self.result = None;
        self.job_id = None;
        self.notice = None;
        self.generation += 1;
        self.transition(WorkflowStage::Upload);
    }

    /// Set the iteration count (clamped to 1-5) while configuring
    pub fn set_iterations(&mut self, iterations: u8) -> Result<IterationCount> {
        self.expect_stage(&[WorkflowStage::Configure], "change iterations")?;
        self.expect_idle("change iterations")?;
        self.iterations = IterationCount::new(iterations);
        Ok(self.iterations)
    }

    /// Configure -> Result (processing); hands back the request to send
    pub fn begin_submission(&mut self) -> Result<SubmissionRequest> {
        self.expect_stage(&[WorkflowStage::Configure], "start inpainting")?;
        self.expect_idle("start inpainting")?;
        self.expect_no_open_stroke("start inpainting")?;
        let (image, mask) = self.expect_image_and_mask()?;

        self.next_sequence += 1;
        let ticket = SubmissionTicket {
            generation: self.generation,
            sequence: self.next_sequence,
        };
        let request = SubmissionRequest {
            ticket,
            image,
            mask,
            iterations: self.iterations,
        };

        if let Some(engine) = self.engine.as_mut() {
            engine.set_enabled(false);
        }
        self.processing = Some(ticket);
        self.pending.insert(ticket.sequence);
        self.result = None;
        self.notice = None;
        info!(
            sequence = ticket.sequence,
            iterations = %request.iterations,
            "Submission started"
        );
        self.transition(WorkflowStage::Result);
        Ok(request)
    }

    /// Apply the outcome of a submission started by [`Self::begin_submission`]
    ///
    /// Success always yields a history entry built from the request's inputs.
    /// Only a completion for the outstanding ticket changes the stage: success
    /// shows the result, failure reverts to Configure with mask and iteration
    /// count preserved.
    ///
    /// # Errors
    /// A request that this workflow never started, or that was already
    /// completed, is refused with a precondition error and changes nothing.
    pub fn complete_submission(
        &mut self,
        request: &SubmissionRequest,
        outcome: Result<InpaintOutput>,
    ) -> Result<Completion> {
        if !self.pending.remove(&request.ticket.sequence) {
            return Err(InpaintError::precondition(format!(
                "Submission {} is not outstanding",
                request.ticket.sequence
            )));
        }
        let current = self.processing == Some(request.ticket);
        if current {
            self.processing = None;
            if let Some(engine) = self.engine.as_mut() {
                engine.set_enabled(true);
            }
        }

        match outcome {
            Ok(output) => {
                let result = Arc::new(output.result_image);
                let entry = HistoryEntry {
                    id: output.job_id.clone(),
                    source: Arc::clone(&request.image),
                    result: Arc::clone(&result),
                    mask: Arc::clone(&request.mask),
                    created_at: Utc::now(),
                    iterations: request.iterations,
                };
                if current {
                    info!(job_id = %output.job_id, "Submission completed");
                    self.result = Some(result);
                    self.job_id = Some(output.job_id);
                } else {
                    debug!(job_id = %output.job_id, "Completed submission was detached");
                }
                Ok(Completion::Succeeded { entry, current })
            },
            Err(error) => {
                if current {
                    warn!(error = %error, "Submission failed");
                    self.notice = Some(SUBMISSION_FAILED_NOTICE.to_string());
                    self.transition(WorkflowStage::Configure);
                } else {
                    debug!(error = %error, "Detached submission failed");
                }
                Ok(Completion::Failed { error, current })
            },
        }
    }

    /// Restore a history entry straight into the Result stage
    pub fn select_history(&mut self, entry: &HistoryEntry) {
        if self.processing.take().is_some() {
            debug!("Detaching outstanding submission for history selection");
        }
        self.image = Some(Arc::clone(&entry.source));
        self.mask = Some(Arc::clone(&entry.mask));
        self.result = Some(Arc::clone(&entry.result));
        self.job_id = Some(entry.id.clone());
        self.iterations = entry.iterations;
        self.engine = None;
        self.notice = None;
        self.generation += 1;
        info!(job_id = %entry.id, "History entry restored");
        self.transition(WorkflowStage::Result);
    }

    /// Press on the canvas
    pub fn begin_stroke(&mut self, pos: ImagePoint) -> Result<bool> {
        Ok(self.authoring_engine("draw")?.begin_stroke(pos))
    }

    /// Pointer motion on the canvas
    pub fn continue_stroke(&mut self, pos: ImagePoint) -> Result<bool> {
        Ok(self.authoring_engine("draw")?.continue_stroke(pos))
    }

    /// Release; the mask is regenerated before this returns
    pub fn end_stroke(&mut self) -> Result<Option<StrokeSummary>> {
        let engine = self.authoring_engine("draw")?;
        let summary = engine.end_stroke();
        if summary.is_some() {
            self.mask = engine.mask();
        }
        Ok(summary)
    }

    /// Discard every mark on the canvas
    pub fn clear_marks(&mut self) -> Result<()> {
        let engine = self.authoring_engine("clear the mask")?;
        if engine.clear() {
            self.mask = engine.mask();
        }
        Ok(())
    }

    pub fn select_tool(&mut self, tool: Tool) -> Result<()> {
        self.authoring_engine("select a tool")?.select_tool(tool);
        Ok(())
    }

    pub fn set_brush_radius(&mut self, radius: u32) -> Result<BrushRadius> {
        let engine = self.authoring_engine("resize the brush")?;
        engine.set_brush_radius(radius);
        Ok(engine.brush_radius())
    }

    /// Forward a keyboard shortcut; keys are inert outside authoring
    pub fn handle_key(&mut self, key: &str) -> bool {
        self.authoring_engine("use shortcuts")
            .map(|engine| engine.handle_key(key))
            .unwrap_or(false)
    }

    fn authoring_engine(&mut self, action: &'static str) -> Result<&mut StrokeEngine> {
        self.expect_stage(&[WorkflowStage::Mark], action)?;
        self.expect_idle(action)?;
        self.engine
            .as_mut()
            .ok_or_else(|| InpaintError::precondition("No canvas surface is available"))
    }

    fn expect_stage(&self, allowed: &[WorkflowStage], action: &'static str) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(InpaintError::invalid_transition(self.stage, action))
        }
    }

    fn expect_idle(&self, action: &'static str) -> Result<()> {
        if self.is_processing() {
            Err(InpaintError::invalid_transition(self.stage, action))
        } else {
            Ok(())
        }
    }

    /// The mask only reflects finished strokes
    fn expect_no_open_stroke(&self, action: &'static str) -> Result<()> {
        if self.is_stroking() {
            Err(InpaintError::invalid_transition(self.stage, action))
        } else {
            Ok(())
        }
    }

    fn is_stroking(&self) -> bool {
        self.engine.as_ref().is_some_and(StrokeEngine::is_stroking)
    }

    fn expect_image_and_mask(&self) -> Result<(Arc<ImagePayload>, Arc<MaskRaster>)> {
        match (&self.image, &self.mask) {
            (Some(image), Some(mask)) => Ok((Arc::clone(image), Arc::clone(mask))),
            (None, _) => Err(InpaintError::precondition("No image has been loaded")),
            (Some(_), None) => Err(InpaintError::precondition("No mask has been drawn")),
        }
    }

    fn transition(&mut self, to: WorkflowStage) {
        if self.stage != to {
            debug!(from = %self.stage, to = %to, "Workflow transition");
        }
        self.stage = to;
    }
}
