//! Building generation: run a named rule set over a lot and collect the
//! resulting model parts into one building.

use bevy::prelude::*;

use super::grammar::{GenerationContext, GrammarError, ModelInstance, RuleSet, Shape, ShapeStatus};

/// A generated building in lot-local coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingModel {
    pub rule_set: String,
    /// Lot width and depth the building was generated for.
    pub lot: Vec2,
    /// Model names referenced by `ModelInstance::model`.
    pub model_names: Vec<String>,
    pub parts: Vec<ModelInstance>,
    /// Shapes no rule rewrote.
    pub terminals: Vec<Shape>,
    pub shape_count: usize,
}

impl BuildingModel {
    /// Raw instance buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.parts)
    }

    pub fn part_count(&self, model: &str) -> usize {
        match self.model_names.iter().position(|n| n == model) {
            Some(index) => self.parts.iter().filter(|p| p.model == index as u32).count(),
            None => 0,
        }
    }

    /// Axis-aligned bounds of every part, `None` for an empty building.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut corners = self.parts.iter().flat_map(|part| {
            let orientation = Quat::from_euler(
                EulerRot::YXZ,
                part.rotation[1].to_radians(),
                part.rotation[0].to_radians(),
                part.rotation[2].to_radians(),
            );
            let origin = Vec3::from_array(part.position);
            let size = Vec3::from_array(part.size);
            (0..8).map(move |i| {
                let corner = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
                origin + orientation * (corner * size)
            })
        });
        let first = corners.next()?;
        Some(corners.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c))))
    }

    pub fn height(&self) -> f32 {
        self.bounds().map_or(0.0, |(lo, hi)| hi.y - lo.y)
    }
}

/// Registry of rule sets sharing one generation context. Generation takes
/// `&mut self`, so runs never interleave.
pub struct BuildingGenerator {
    rule_sets: Vec<RuleSet>,
    context: GenerationContext,
}

impl BuildingGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rule_sets: Vec::new(),
            context: GenerationContext::new(seed),
        }
    }

    /// Generator preloaded with the built-in rule sets.
    pub fn with_builtin(seed: u64) -> Self {
        let mut generator = Self::new(seed);
        for rule_set in super::rulesets::builtin() {
            generator.register(rule_set);
        }
        generator
    }

    /// Add a rule set, replacing one with the same name.
    pub fn register(&mut self, rule_set: RuleSet) {
        match self.rule_sets.iter_mut().find(|r| r.name == rule_set.name) {
            Some(existing) => *existing = rule_set,
            None => self.rule_sets.push(rule_set),
        }
    }

    pub fn rule_set(&self, name: &str) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|r| r.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rule_sets.iter().map(|r| r.name.as_str())
    }

    /// State left by the last run, for inspection.
    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    /// Derive a building from rule set `name` on a `lot.x` by `lot.y` lot.
    pub fn generate(&mut self, name: &str, lot: Vec2) -> Result<BuildingModel, GrammarError> {
        self.context.clear();
        let rule_set = self
            .rule_sets
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| GrammarError::RuleSetNotFound(name.to_string()))?;
        let mut axiom = rule_set
            .axiom
            .clone()
            .ok_or_else(|| GrammarError::MissingAxiom(name.to_string()))?;
        axiom.scope.size = Vec3::new(lot.x, 0.0, lot.y);

        rule_set.derive(&mut self.context, axiom)?;

        let terminals = self
            .context
            .history()
            .iter()
            .filter(|s| s.status == ShapeStatus::Terminal)
            .cloned()
            .collect();
        let shape_count = self.context.history().len();
        let (model_names, parts) = self.context.take_models();
        Ok(BuildingModel {
            rule_set: name.to_string(),
            lot,
            model_names,
            parts,
            terminals,
            shape_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::grammar::{Rule, RuleActionItem, Scope};

    #[test]
    fn unknown_rule_set_is_an_error() {
        let mut generator = BuildingGenerator::new(0);
        assert_eq!(
            generator.generate("castle", Vec2::ONE),
            Err(GrammarError::RuleSetNotFound("castle".into()))
        );
    }

    #[test]
    fn missing_axiom_is_an_error() {
        let mut generator = BuildingGenerator::new(0);
        let mut rule_set = RuleSet::new("empty", Shape::default());
        rule_set.axiom = None;
        generator.register(rule_set);
        assert_eq!(
            generator.generate("empty", Vec2::ONE),
            Err(GrammarError::MissingAxiom("empty".into()))
        );
    }

    #[test]
    fn lot_size_reaches_the_axiom() {
        let mut generator = BuildingGenerator::new(0);
        generator.register(
            RuleSet::new("block", Shape::new("Lot", Scope::default())).with_priority(vec![Rule::always(
                "Lot",
                vec![RuleActionItem::output("Slab")],
            )]),
        );
        let model = generator.generate("block", Vec2::new(6.0, 4.0)).unwrap();
        assert_eq!(model.shape_count, 2);
        assert_eq!(model.terminals.len(), 1);
        assert_eq!(model.terminals[0].scope.size, Vec3::new(6.0, 0.0, 4.0));
        assert!(model.parts.is_empty());
        assert_eq!(model.bounds(), None);
    }

    #[test]
    fn builtin_rule_sets_produce_buildings() {
        let mut generator = BuildingGenerator::with_builtin(5);
        let names: Vec<String> = generator.names().map(str::to_string).collect();
        assert!(names.len() >= 3);

        for name in names {
            let model = generator.generate(&name, Vec2::new(12.0, 10.0)).unwrap();
            assert!(!model.parts.is_empty(), "{name} produced no parts");
            assert!(model.height() > 0.0, "{name} is flat");
            assert_eq!(model.as_bytes().len(), model.parts.len() * std::mem::size_of::<ModelInstance>());
        }
    }
}
