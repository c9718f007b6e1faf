//! Pathway construction operations.

use procgen_eval::{Call, EvalResult, OperationDescriptor, OperationRegistry, Step};
use procgen_types::{Pathway, PathwayPoint, Raw, Variables};

/// A new pathway of `kind` whose first point comes from the `x`, `y` and
/// `size` variables (each defaulting to 0).
pub fn create_pathway(kind: &str, variables: &Variables, ast_id: &str) -> Pathway {
    let number = |name: &str| variables.get(name).and_then(Raw::as_number).unwrap_or(0.0);
    Pathway {
        points: vec![PathwayPoint {
            x: number("x"),
            y: number("y"),
            size: number("size"),
            ast_id: ast_id.to_string(),
        }],
        kind: kind.to_string(),
    }
}

pub fn operations() -> OperationRegistry {
    OperationRegistry::new()
        .with("pathwayFrom", OperationDescriptor::new(pathway_from).with_this())
        .with("pathwayTo", OperationDescriptor::new(pathway_to).with_this())
}

fn point(call: &Call<'_>) -> EvalResult<PathwayPoint> {
    Ok(PathwayPoint {
        x: call.number(0)?,
        y: call.number(1)?,
        size: call.number(2)?,
        ast_id: call.ast_id().to_string(),
    })
}

/// `pathwayFrom(x, y, size)`: restart the pathway at a single point.
fn pathway_from(mut call: Call<'_>) -> EvalResult<Step> {
    let pathway = call.take_pathway()?;
    Ok(Step::replace(Pathway {
        points: vec![point(&call)?],
        kind: pathway.kind,
    }))
}

/// `pathwayTo(x, y, size)`: extend the pathway by one point.
fn pathway_to(mut call: Call<'_>) -> EvalResult<Step> {
    let mut pathway = call.take_pathway()?;
    pathway.points.push(point(&call)?);
    Ok(Step::replace(pathway))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_point_comes_from_variables() {
        let mut variables = Variables::new();
        variables.insert("x".into(), Raw::Number(1.0));
        variables.insert("size".into(), Raw::Number(6.0));
        let street = create_pathway("street", &variables, "n0");
        assert_eq!(street.kind, "street");
        assert_eq!(
            street.points,
            vec![PathwayPoint {
                x: 1.0,
                y: 0.0,
                size: 6.0,
                ast_id: "n0".into(),
            }]
        );
    }
}
