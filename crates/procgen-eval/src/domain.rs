//! The host configuration seam.

use crate::error::EvalResult;
use crate::queue::Queue;
use procgen_types::{Progress, Raw, Variables};

/// Domain behavior the scheduler delegates to.
///
/// Payload cloning is `Raw: Clone` and progress comparison is the total
/// order on [`Progress`], so neither appears here.
pub trait Domain {
    /// What one slice publishes.
    type Payload;

    /// The initial payload of a root entry.
    fn create_value(&self, initial_variables: &Variables, ast_id: &str) -> EvalResult<Raw>;

    /// How far `raw` has advanced. Payloads that do not advance report
    /// [`Progress::STATIC`].
    fn compute_progress(&self, raw: &Raw) -> Progress;

    /// `true` when the slice that started at `start` has advanced far enough
    /// to publish.
    fn should_interrupt(&self, start: Progress, current: Progress) -> bool;

    /// Build the slice payload. The queue is mutable so derived artifacts
    /// can be read through [`Queue::get_cached`].
    fn serialize(
        &self,
        queue: &mut Queue,
        prev_progress: Option<Progress>,
        current_progress: Option<Progress>,
    ) -> Self::Payload;
}
