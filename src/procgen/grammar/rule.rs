//! Rule sets, rules, and the derivation loop.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::context::GenerationContext;
use super::error::GrammarError;
use super::functions::RuleFunction;
use super::shape::{Shape, ShapeStatus};
use crate::config::ConfigError;

/// Upper bound on shapes evaluated in one derivation.
pub const MAX_EVALUATIONS: usize = 200_000;

/// Functions run in order on the target, then an optional output symbol.
/// A named target gets a new child carrying the output symbol; an unnamed
/// carrier is renamed and spawned itself.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleActionItem {
    #[serde(default)]
    pub functions: Vec<RuleFunction>,
    #[serde(default)]
    pub output: Option<String>,
}

impl RuleActionItem {
    pub fn new(functions: Vec<RuleFunction>, output: Option<&str>) -> Self {
        Self {
            functions,
            output: output.map(str::to_string),
        }
    }

    /// Item that only emits `symbol`.
    pub fn output(symbol: &str) -> Self {
        Self::new(Vec::new(), Some(symbol))
    }

    pub fn run(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        if self.functions.is_empty() && self.output.is_none() {
            return Err(GrammarError::EmptyActionItem);
        }
        for function in &self.functions {
            function.execute(ctx, target)?;
        }

        match &self.output {
            Some(output) if target.symbol.is_some() => {
                let child = target.child(output.clone(), target.scope.detached(), target.rotation);
                ctx.spawn(child);
            }
            Some(output) => {
                target.symbol = Some(output.clone());
                ctx.spawn(target.clone());
            }
            None => {}
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleAction {
    pub probability: f32,
    pub items: Vec<RuleActionItem>,
}

impl RuleAction {
    pub fn new(probability: f32, items: Vec<RuleActionItem>) -> Self {
        Self { probability, items }
    }

    pub fn fire(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        for item in &self.items {
            item.run(ctx, target)?;
        }
        Ok(())
    }
}

/// Rewrites shapes carrying `symbol` when every condition holds. One
/// action is drawn by probability each time the rule fires.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub symbol: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl Rule {
    pub fn new(symbol: &str, conditions: Vec<Condition>, actions: Vec<RuleAction>) -> Self {
        Self {
            symbol: symbol.to_string(),
            conditions,
            actions,
        }
    }

    /// Single certain action.
    pub fn always(symbol: &str, items: Vec<RuleActionItem>) -> Self {
        Self::new(symbol, Vec::new(), vec![RuleAction::new(1.0, items)])
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn matches(&self, ctx: &mut GenerationContext, target: &Shape) -> Result<bool, GrammarError> {
        if !target.has_symbol(&self.symbol) {
            return Ok(false);
        }
        for condition in &self.conditions {
            if !condition.evaluate(ctx, target)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The action whose cumulative probability bin holds `u`.
    pub fn select_action(&self, u: f32) -> Option<&RuleAction> {
        let mut min = 0.0;
        let mut max = f32::EPSILON;
        for action in &self.actions {
            max += action.probability;
            if min <= u && u < max {
                return Some(action);
            }
            min = max;
        }
        None
    }

    pub fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        if self.conditions.is_empty() && self.actions.is_empty() {
            return Ok(());
        }

        let sum: f32 = self.actions.iter().map(|a| a.probability).sum();
        if sum <= 0.0 || sum > 1.0 + 1e-5 {
            return Err(GrammarError::InvalidProbability {
                symbol: self.symbol.clone(),
                sum,
            });
        }

        let u = ctx.random_unit();
        match self.select_action(u) {
            Some(action) => action.fire(ctx, target),
            None => Ok(()),
        }
    }
}

/// Rules grouped by priority, highest first.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RulePriority {
    pub rules: Vec<Rule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    #[serde(default)]
    pub axiom: Option<Shape>,
    pub priorities: Vec<RulePriority>,
}

impl RuleSet {
    pub fn new(name: &str, axiom: Shape) -> Self {
        Self {
            name: name.to_string(),
            axiom: Some(axiom),
            priorities: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Append a priority level holding `rules`.
    pub fn with_priority(mut self, rules: Vec<Rule>) -> Self {
        self.priorities.push(RulePriority { rules });
        self
    }

    /// Fire the first matching rule, scanning priorities in order. Returns
    /// whether a rule fired.
    pub fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<bool, GrammarError> {
        for priority in &self.priorities {
            for rule in &priority.rules {
                if rule.matches(ctx, target)? {
                    rule.execute(ctx, target)?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Evaluate `axiom` and everything it spawns until the queue drains.
    pub fn derive(&self, ctx: &mut GenerationContext, axiom: Shape) -> Result<(), GrammarError> {
        ctx.spawn(axiom);
        while let Some(mut shape) = ctx.next() {
            if ctx.evaluations() > MAX_EVALUATIONS {
                return Err(GrammarError::EvaluationLimit(MAX_EVALUATIONS));
            }
            let fired = self.execute(ctx, &mut shape)?;
            let status = if fired {
                ShapeStatus::Evaluated
            } else {
                ShapeStatus::Terminal
            };
            ctx.finish(shape, status);
        }
        debug!(
            "Derived `{}`: {} shapes, {} model parts",
            self.name,
            ctx.history().len(),
            ctx.instances().len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::grammar::functions::{Subdivide, SpawnModel};
    use crate::procgen::grammar::shape::{Axis, Scope};
    use crate::procgen::grammar::value::Value;
    use bevy::math::Vec3;

    fn lot() -> Shape {
        Shape::new("A", Scope::new(Vec3::ZERO, Vec3::new(4.0, 0.0, 4.0)))
    }

    #[test]
    fn single_certain_action_always_fires() {
        let rule = Rule::always("A", vec![RuleActionItem::output("B")]);
        for u in [0.0, 0.25, 0.5, 0.999_999] {
            assert!(rule.select_action(u).is_some());
        }
    }

    #[test]
    fn probability_bins_are_cumulative() {
        let rule = Rule::new(
            "A",
            vec![],
            vec![
                RuleAction::new(0.25, vec![RuleActionItem::output("B")]),
                RuleAction::new(0.75, vec![RuleActionItem::output("C")]),
            ],
        );
        let pick = |u| rule.select_action(u).and_then(|a| a.items[0].output.clone());
        assert_eq!(pick(0.1), Some("B".into()));
        assert_eq!(pick(0.5), Some("C".into()));
    }

    #[test]
    fn one_rule_two_outputs_spawns_two_children() {
        let rules = RuleSet::new("test", lot()).with_priority(vec![Rule::always(
            "A",
            vec![RuleActionItem::output("B"), RuleActionItem::output("B")],
        )]);
        let mut ctx = GenerationContext::new(3);
        rules.derive(&mut ctx, lot()).unwrap();

        let history = ctx.history();
        assert_eq!(history.len(), 3);
        assert_eq!(ctx.evaluations(), 3);
        assert_eq!(ctx.queue_len(), 0);
        assert_eq!(history[0].status, ShapeStatus::Evaluated);
        assert!(history[1..].iter().all(|s| s.has_symbol("B") && s.status == ShapeStatus::Terminal));
        assert!(history[1..].iter().all(|s| s.parent == history[0].id));
    }

    #[test]
    fn invalid_probability_sum_aborts() {
        let rules = RuleSet::new("test", lot()).with_priority(vec![Rule::new(
            "A",
            vec![],
            vec![
                RuleAction::new(0.7, vec![RuleActionItem::output("B")]),
                RuleAction::new(0.7, vec![RuleActionItem::output("C")]),
            ],
        )]);
        let mut ctx = GenerationContext::new(3);
        assert!(matches!(
            rules.derive(&mut ctx, lot()),
            Err(GrammarError::InvalidProbability { .. })
        ));
    }

    #[test]
    fn empty_item_is_an_error() {
        let mut ctx = GenerationContext::new(0);
        let mut shape = lot();
        assert_eq!(
            RuleActionItem::default().run(&mut ctx, &mut shape),
            Err(GrammarError::EmptyActionItem)
        );
    }

    #[test]
    fn higher_priority_wins() {
        let rules = RuleSet::new("test", lot())
            .with_priority(vec![Rule::always("A", vec![RuleActionItem::output("First")])])
            .with_priority(vec![Rule::always("A", vec![RuleActionItem::output("Second")])]);
        let mut ctx = GenerationContext::new(0);
        rules.derive(&mut ctx, lot()).unwrap();
        assert!(ctx.history()[1].has_symbol("First"));
        assert_eq!(ctx.history().len(), 2);
    }

    #[test]
    fn carriers_without_output_are_discarded() {
        let split = Subdivide {
            axis: Axis::X,
            values: vec![Value::fraction(1.0), Value::fraction(1.0)],
            items: vec![
                Some(RuleActionItem::new(
                    vec![RuleFunction::SpawnModel(SpawnModel::new("bench"))],
                    None,
                )),
                Some(RuleActionItem::output("Tree")),
            ],
        };
        let rules = RuleSet::new("test", lot())
            .with_priority(vec![Rule::always("A", vec![RuleActionItem::new(vec![RuleFunction::Subdivide(split)], None)])]);
        let mut ctx = GenerationContext::new(0);
        rules.derive(&mut ctx, lot()).unwrap();

        assert_eq!(ctx.history().len(), 2);
        assert!(ctx.history()[1].has_symbol("Tree"));
        assert_eq!(ctx.instances().len(), 1);
        assert_eq!(ctx.instances()[0].size, [2.0, 0.0, 4.0]);
    }
}
