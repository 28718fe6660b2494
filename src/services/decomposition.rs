//! Objective decomposition.
//!
//! Turns an objective description into dependency-ordered tasks using
//! strategy-specific templates. Parallelizable sub-tasks are siblings
//! without dependency edges.

use uuid::Uuid;

use crate::domain::models::{resolve_strategy, Objective, ObjectiveStrategy, Task};

/// One template step: a task type, a name, and which previous steps it
/// depends on (by index into the plan).
struct Step {
    task_type: &'static str,
    name: &'static str,
    depends_on: &'static [usize],
}

const DEVELOPMENT: &[Step] = &[
    Step { task_type: "analysis", name: "analysis", depends_on: &[] },
    Step { task_type: "analysis", name: "design", depends_on: &[0] },
    // Implementation steps run in parallel once design completes.
    Step { task_type: "coding", name: "implementation: core", depends_on: &[1] },
    Step { task_type: "coding", name: "implementation: interface", depends_on: &[1] },
    Step { task_type: "testing", name: "testing", depends_on: &[2, 3] },
    Step { task_type: "generic", name: "documentation", depends_on: &[4] },
];

const RESEARCH: &[Step] = &[
    Step { task_type: "analysis", name: "gather", depends_on: &[] },
    Step { task_type: "analysis", name: "synthesize", depends_on: &[0] },
    Step { task_type: "analysis", name: "analyze", depends_on: &[1] },
];

const ANALYSIS: &[Step] = &[
    Step { task_type: "analysis", name: "scan", depends_on: &[] },
    Step { task_type: "analysis", name: "analyze", depends_on: &[0] },
    Step { task_type: "generic", name: "report", depends_on: &[1] },
];

const TESTING: &[Step] = &[
    Step { task_type: "testing", name: "plan", depends_on: &[] },
    Step { task_type: "testing", name: "author", depends_on: &[0] },
    Step { task_type: "testing", name: "execute", depends_on: &[1] },
    Step { task_type: "generic", name: "report", depends_on: &[2] },
];

const OPTIMIZATION: &[Step] = &[
    Step { task_type: "analysis", name: "baseline", depends_on: &[] },
    Step { task_type: "analysis", name: "measure", depends_on: &[0] },
    Step { task_type: "coding", name: "tune", depends_on: &[1] },
    Step { task_type: "testing", name: "verify", depends_on: &[2] },
];

fn template(strategy: ObjectiveStrategy) -> &'static [Step] {
    match strategy {
        ObjectiveStrategy::Development | ObjectiveStrategy::Auto => DEVELOPMENT,
        ObjectiveStrategy::Research => RESEARCH,
        ObjectiveStrategy::Analysis => ANALYSIS,
        ObjectiveStrategy::Testing => TESTING,
        ObjectiveStrategy::Optimization => OPTIMIZATION,
    }
}

/// Decompose an objective into tasks with dependency edges enforcing the
/// template ordering.
pub fn decompose(objective: &Objective) -> Vec<Task> {
    let strategy = resolve_strategy(objective.strategy, &objective.description);
    let steps = template(strategy);

    let ids: Vec<Uuid> = steps.iter().map(|_| Uuid::new_v4()).collect();

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let mut task = Task::new(objective.swarm_id, step.task_type, step.name)
                .with_objective(objective.id)
                .with_description(format!("{} — {}", step.name, objective.description))
                .with_instructions(objective.description.clone());
            task.id = ids[i];
            for dep_index in step.depends_on {
                task = task.with_dependency(ids[*dep_index]);
            }
            task
        })
        .collect()
}
