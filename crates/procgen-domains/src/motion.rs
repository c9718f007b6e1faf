//! Motion entities and the operations that animate them.
//!
//! Every operation appends keyframes to the current entity. Operations that
//! depend on other entities (`follow`, `spawnOn`, `moveToAndDodge`) read the
//! queue; when what they need is not there yet they wait a short delay and
//! re-issue themselves instead of failing.

use crate::network::PathwayNetwork;
use procgen_eval::{
    Call, EntryState, EvalError, EvalResult, OperationDescriptor, OperationRegistry, Step,
};
use procgen_types::ast::Transformation;
use procgen_types::{Keyframe, MotionEntity, Point, Raw, Variables};
use tracing::trace;

/// Simulated seconds advanced by one `moveToAndDodge` step.
pub const TIME_STEP: f64 = 0.1;

/// Delay added to every keyframe copied by `follow`.
const FOLLOW_DELAY: f64 = 0.01;

/// Most entities a single `clone` or `spawnOn` may create.
pub const MAX_FISSION: usize = 4096;

// ══════════════════════════════════════════════════════════════════════════════
// Entities
// ══════════════════════════════════════════════════════════════════════════════

/// Per-type defaults of a new entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityDefaults {
    pub url: Option<&'static str>,
    pub radius: f64,
    pub speed: f64,
}

pub fn entity_defaults(kind: &str) -> Option<EntityDefaults> {
    let (url, radius, speed) = match kind {
        "pedestrian" => (Some("models/human"), 1.0, 1.5),
        "car" => (Some("models/car"), 2.5, 17.0),
        "bus" => (Some("models/bus"), 3.0, 14.0),
        "train" => (Some("models/train"), 3.0, 17.0),
        "cyclist" => (Some("models/cyclist"), 1.5, 4.0),
        "camera" => (None, 0.0, 5.0),
        _ => return None,
    };
    Some(EntityDefaults { url, radius, speed })
}

/// A new entity of `kind` with one keyframe taken from the `x`, `y`, `z`
/// and `time` variables (each defaulting to 0).
pub fn create_motion_entity(
    kind: &str,
    variables: &Variables,
    ast_id: &str,
) -> EvalResult<MotionEntity> {
    let defaults = entity_defaults(kind).ok_or_else(|| EvalError::UnknownEntityType {
        type_name: kind.to_string(),
    })?;
    let number = |name: &str| variables.get(name).and_then(Raw::as_number).unwrap_or(0.0);
    Ok(MotionEntity {
        keyframes: vec![Keyframe {
            x: number("x"),
            y: number("y"),
            z: number("z"),
            t: number("time"),
            ast_id: ast_id.to_string(),
            speed: defaults.speed,
        }],
        url: defaults.url.map(str::to_string),
        radius: defaults.radius,
        kind: kind.to_string(),
    })
}

// ══════════════════════════════════════════════════════════════════════════════
// Operations
// ══════════════════════════════════════════════════════════════════════════════

/// Registry of the motion operations. `retry_delay` is the wait inserted
/// before an operation re-issues itself.
pub fn operations(retry_delay: f64) -> OperationRegistry {
    OperationRegistry::new()
        .with("moveTo", OperationDescriptor::new(move |call| move_to(call, retry_delay)).with_this())
        .with("moveBy", OperationDescriptor::new(move_by).with_this())
        .with("wait", OperationDescriptor::new(wait).with_this())
        .with("later", OperationDescriptor::new(later).with_this())
        .with("speed", OperationDescriptor::new(speed).with_this())
        .with("clone", OperationDescriptor::new(clone_entity).with_this())
        .with(
            "follow",
            OperationDescriptor::new(move |call| follow(call, retry_delay))
                .with_this()
                .with_queue(),
        )
        .with(
            "spawnOn",
            OperationDescriptor::new(move |call| spawn_on(call, retry_delay))
                .with_this()
                .with_queue(),
        )
        .with(
            "moveToAndDodge",
            OperationDescriptor::new(move_to_and_dodge)
                .with_this()
                .with_queue(),
        )
        .with(
            "randomPointOn",
            OperationDescriptor::new(random_point_on)
                .with_this()
                .with_queue(),
        )
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn last_keyframe(call: &Call<'_>, entity: &MotionEntity) -> EvalResult<Keyframe> {
    entity
        .last_keyframe()
        .cloned()
        .ok_or_else(|| EvalError::InvalidProgram {
            ast_id: call.ast_id().to_string(),
            message: format!("\"{}\" on a motion entity without keyframes", call.identifier),
        })
}

fn travel_time(distance: f64, speed: f64) -> f64 {
    if distance == 0.0 {
        0.0
    } else {
        distance / speed
    }
}

/// Wait `delay`, then run the invoking node again.
fn retry(call: &Call<'_>, entity: MotionEntity, delay: f64) -> Step {
    Step::replace_then(
        entity,
        vec![
            Transformation::precomputed(call.ast_id(), "wait", vec![Raw::Number(delay)]),
            call.node.clone(),
        ],
    )
}

fn push_keyframe(entity: &mut MotionEntity, from: &Keyframe, at: Point, t: f64, ast_id: &str) {
    entity.keyframes.push(Keyframe {
        x: at.x,
        y: at.y,
        z: at.z,
        t,
        ast_id: ast_id.to_string(),
        speed: from.speed,
    });
}

/// `amount` as a number of entities to split into, at most [`MAX_FISSION`].
fn fission_count(call: &Call<'_>, index: usize, amount: f64) -> EvalResult<usize> {
    if !(0.0..=MAX_FISSION as f64).contains(&amount) || amount.fract() != 0.0 {
        return Err(call.parameter_error(
            index,
            format!("expected a count between 0 and {MAX_FISSION}, got {amount}"),
        ));
    }
    Ok(amount as usize)
}

// ── Movement ─────────────────────────────────────────────────────────────

/// `moveTo(x, y, z[, dt])` or `moveTo(point[, dt])`.
fn move_to(mut call: Call<'_>, retry_delay: f64) -> EvalResult<Step> {
    let mut entity = call.take_motion()?;
    let (target, duration) = match call.parameters.first() {
        Some(Raw::Point(point)) => (*point, call.optional_number(1)?),
        Some(Raw::Number(_)) => (
            Point::new(call.number(0)?, call.number(1)?, call.number(2)?),
            call.optional_number(3)?,
        ),
        None | Some(Raw::Nil) => {
            trace!(node = %call.ast_id(), "moveTo target not available yet");
            return Ok(retry(&call, entity, retry_delay));
        }
        Some(other) => {
            return Err(call.parameter_error(
                0,
                format!("expected number or point, got {}", other.type_name()),
            ))
        }
    };
    let last = last_keyframe(&call, &entity)?;
    let duration =
        duration.unwrap_or_else(|| travel_time(last.position().distance_to(&target), last.speed));
    push_keyframe(&mut entity, &last, target, last.t + duration, call.ast_id());
    Ok(Step::replace(entity))
}

/// `moveBy(dx, dy, dz)` at the current speed.
fn move_by(mut call: Call<'_>) -> EvalResult<Step> {
    let mut entity = call.take_motion()?;
    let delta = Point::new(call.number(0)?, call.number(1)?, call.number(2)?);
    let last = last_keyframe(&call, &entity)?;
    let from = last.position();
    let target = Point::new(from.x + delta.x, from.y + delta.y, from.z + delta.z);
    let duration = travel_time(from.distance_to(&target), last.speed);
    push_keyframe(&mut entity, &last, target, last.t + duration, call.ast_id());
    Ok(Step::replace(entity))
}

/// `wait(t)`: stay in place for `t` seconds.
fn wait(mut call: Call<'_>) -> EvalResult<Step> {
    let mut entity = call.take_motion()?;
    let duration = call.number(0)?;
    let last = last_keyframe(&call, &entity)?;
    push_keyframe(&mut entity, &last, last.position(), last.t + duration, call.ast_id());
    Ok(Step::replace(entity))
}

/// `later(t)`: shift the last keyframe `t` seconds into the future.
fn later(mut call: Call<'_>) -> EvalResult<Step> {
    let mut entity = call.take_motion()?;
    let delay = call.number(0)?;
    last_keyframe(&call, &entity)?;
    if let Some(last) = entity.keyframes.last_mut() {
        last.t += delay;
    }
    Ok(Step::replace(entity))
}

/// `speed(s)`: speed used by subsequent movement.
fn speed(mut call: Call<'_>) -> EvalResult<Step> {
    let mut entity = call.take_motion()?;
    let speed = call.number(0)?;
    last_keyframe(&call, &entity)?;
    if let Some(last) = entity.keyframes.last_mut() {
        last.speed = speed;
    }
    Ok(Step::replace(entity))
}

/// `clone(n)`: split into `n` identical entities.
fn clone_entity(mut call: Call<'_>) -> EvalResult<Step> {
    let entity = call.take_motion()?;
    let amount = fission_count(&call, 0, call.number(0)?)?;
    Ok(Step::fork(vec![Raw::Motion(entity); amount]))
}

// ── Cross-entity ─────────────────────────────────────────────────────────

/// `follow(targetId[, ox, oy, oz])`: replay the target's keyframes with an
/// offset, slightly delayed, until the target has finished.
fn follow(mut call: Call<'_>, retry_delay: f64) -> EvalResult<Step> {
    let mut entity = call.take_motion()?;
    let target_id = call.string(0)?;
    let offset = Point::new(
        call.number_or(1, 0.0)?,
        call.number_or(2, 0.0)?,
        call.number_or(3, 0.0)?,
    );
    let last = last_keyframe(&call, &entity)?;

    let target = call
        .queue()?
        .find(&target_id)
        .and_then(|(target, state)| match target.raw() {
            Raw::Motion(target) => Some((target.keyframes.clone(), state == EntryState::Finished)),
            _ => None,
        });
    let Some((keyframes, finished)) = target else {
        trace!(target = %target_id, "follow target not spawned yet");
        return Ok(retry(&call, entity, retry_delay));
    };

    let copied: Vec<Keyframe> = keyframes
        .iter()
        .filter(|keyframe| keyframe.t >= last.t)
        .map(|keyframe| Keyframe {
            x: keyframe.x + offset.x,
            y: keyframe.y + offset.y,
            z: keyframe.z + offset.z,
            t: keyframe.t + FOLLOW_DELAY,
            ast_id: call.ast_id().to_string(),
            speed: last.speed,
        })
        .collect();

    let copied_any = !copied.is_empty();
    if copied_any && last.t == 0.0 {
        entity.keyframes.clear();
    }
    entity.keyframes.extend(copied);

    if finished {
        Ok(Step::replace(entity))
    } else if copied_any {
        Ok(Step::replace_then(entity, vec![call.node.clone()]))
    } else {
        Ok(retry(&call, entity, retry_delay))
    }
}

/// `spawnOn([type = "street", amount = 1])`: split into `amount` new
/// entities placed on the pathway network of `type`.
fn spawn_on(mut call: Call<'_>, retry_delay: f64) -> EvalResult<Step> {
    let entity = call.take_motion()?;
    let kind = call.string_or(0, "street")?;
    let amount = fission_count(&call, 1, call.number_or(1, 1.0)?)?;
    let Some(network) = PathwayNetwork::cached(call.queue()?, &kind) else {
        trace!(kind = %kind, "pathway network not ready for spawnOn");
        return Ok(retry(&call, entity, retry_delay));
    };
    let last = last_keyframe(&call, &entity)?;
    let spawned = network
        .sample(&call.identity, amount)
        .into_iter()
        .map(|at| {
            Raw::Motion(MotionEntity {
                keyframes: vec![Keyframe {
                    x: at.x,
                    y: at.y,
                    z: at.z,
                    t: last.t,
                    ast_id: call.ast_id().to_string(),
                    speed: last.speed,
                }],
                url: entity.url.clone(),
                radius: entity.radius,
                kind: entity.kind.clone(),
            })
        })
        .collect();
    Ok(Step::fork(spawned))
}

/// `randomPointOn(type)`: a point on the pathway network of `type`, or nil
/// while it is not ready. The draw is keyed by the entry and, for motion
/// entities, by the current time so repeated calls move on.
fn random_point_on(mut call: Call<'_>) -> EvalResult<Step> {
    let kind = call.string(0)?;
    let time = match &call.this {
        Some(Raw::Motion(entity)) => entity.current_time().to_string(),
        _ => String::new(),
    };
    let key = format!("{}{}{}", call.identity, call.ast_id(), time);
    let point = PathwayNetwork::cached(call.queue()?, &kind)
        .and_then(|network| network.sample(&key, 1).pop())
        .map_or(Raw::Nil, Raw::Point);
    Ok(Step::replace(point))
}

/// `moveToAndDodge(x, y, z)`: advance one time step toward the target,
/// standing still for a step that would collide with another entity.
fn move_to_and_dodge(mut call: Call<'_>) -> EvalResult<Step> {
    let mut entity = call.take_motion()?;
    let target = Point::new(call.number(0)?, call.number(1)?, call.number(2)?);
    let last = last_keyframe(&call, &entity)?;
    if last.speed <= 0.0 {
        return Err(EvalError::InvalidProgram {
            ast_id: call.ast_id().to_string(),
            message: format!("moveToAndDodge needs a positive speed, got {}", last.speed),
        });
    }

    let from = last.position();
    let distance = from.distance_to(&target);
    let step = (TIME_STEP * last.speed).min(distance);
    let t = last.t + step / last.speed;
    let candidate = if distance == 0.0 {
        from
    } else {
        from.lerp(&target, step / distance)
    };

    let radius = entity.radius;
    let queue = call.queue()?;
    let blocked = queue
        .in_flight()
        .chain(queue.results())
        .filter_map(|other| match other.raw() {
            Raw::Motion(other) => Some(other),
            _ => None,
        })
        .any(|other| {
            other
                .position_at(t, TIME_STEP + 0.001)
                .is_some_and(|at| at.distance_to(&candidate) < other.radius + radius)
        });

    let next = if blocked { from } else { candidate };
    push_keyframe(&mut entity, &last, next, t, call.ast_id());

    if distance <= step {
        return Ok(Step::replace(entity));
    }
    Ok(Step::replace_then(
        entity,
        vec![Transformation::precomputed(
            call.ast_id(),
            "moveToAndDodge",
            vec![target.x.into(), target.y.into(), target.z.into()],
        )],
    ))
}
