//! Built-in building grammars.
//!
//! Every rule set starts from a flat `Lot` axiom whose size the generator
//! sets to the lot footprint, extrudes it into a `Mass` and details the
//! facades. Model names are placeholders for whatever mesh library the
//! consumer maps them to.

use bevy::math::Vec3;

use super::grammar::functions::{ComponentSplit, ComponentType, MoveScope, Repeat, Roof, RoofType, ScaleScope, SpawnModel, Subdivide};
use super::grammar::{
    Axis, Condition, ConditionType, OcclusionFilter, OcclusionResult, Operator, Rule, RuleAction, RuleActionItem,
    RuleFunction, RuleSet, Scope, ScopeProperty, Shape, ShapeQuery, Value,
};

pub const RESIDENTIAL_HOUSE: &str = "residential_house";
pub const APARTMENT_BLOCK: &str = "apartment_block";
pub const OFFICE_TOWER: &str = "office_tower";

/// Every built-in rule set, densest first.
pub fn builtin() -> Vec<RuleSet> {
    vec![office_tower(), apartment_block(), residential_house()]
}

fn axiom() -> Shape {
    Shape::new("Lot", Scope::new(Vec3::ZERO, Vec3::ZERO))
}

fn item(functions: Vec<RuleFunction>, output: Option<&str>) -> RuleActionItem {
    RuleActionItem::new(functions, output)
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn model(symbol: &str, name: &str) -> Rule {
    Rule::always(symbol, vec![item(vec![RuleFunction::SpawnModel(SpawnModel::new(name))], None)])
}

/// Lot -> Mass of the given height.
fn extrude(height: Value) -> Rule {
    Rule::always(
        "Lot",
        vec![item(
            vec![RuleFunction::ScaleScope(ScaleScope {
                values: vec![Value::fraction(1.0), height, Value::fraction(1.0)],
            })],
            Some("Mass"),
        )],
    )
}

fn faces(counts: [f32; 3], names: [&str; 3]) -> RuleFunction {
    RuleFunction::Component(ComponentSplit::new(
        ComponentType::Faces,
        counts.iter().map(|c| Value::number(*c)).collect(),
        symbols(&names),
    ))
}

fn repeat(axis: Axis, spacing: f32, symbol: &str) -> RuleFunction {
    let mut axes = vec![false; 3];
    axes[axis.index()] = true;
    RuleFunction::Repeat(Repeat {
        axes,
        values: vec![Value::number(spacing)],
        symbols: symbols(&[symbol]),
    })
}

/// Wall, centred opening, wall.
fn bay(opening: f32, middle: &str) -> RuleFunction {
    RuleFunction::Subdivide(Subdivide {
        axis: Axis::X,
        values: vec![Value::fraction(1.0), Value::number(opening), Value::fraction(1.0)],
        items: vec![
            Some(RuleActionItem::output("Wall")),
            Some(RuleActionItem::output(middle)),
            Some(RuleActionItem::output("Wall")),
        ],
    })
}

fn visible() -> Condition {
    Condition::new(ShapeQuery::Visible, ConditionType::True, None)
}

/// Ground floor of height `ground` on the street facade, storeys above.
fn street_facade(ground: f32, storey: f32, ground_symbol: &str) -> Rule {
    Rule::always(
        "Facade",
        vec![item(
            vec![RuleFunction::Subdivide(Subdivide {
                axis: Axis::Y,
                values: vec![Value::number(ground), Value::fraction(1.0)],
                items: vec![
                    Some(RuleActionItem::output(ground_symbol)),
                    Some(item(vec![repeat(Axis::Y, storey, "Storey")], None)),
                ],
            })],
            None,
        )],
    )
    .with_condition(visible())
}

pub fn residential_house() -> RuleSet {
    RuleSet::new(RESIDENTIAL_HOUSE, axiom())
        .with_priority(vec![
            extrude(Value::random(4.0, 7.0)),
            Rule::always(
                "Mass",
                vec![
                    item(vec![faces([4.0, 1.0, 1.0], ["Facade", "Floor", "Ceiling"])], None),
                    item(
                        vec![
                            RuleFunction::MoveScope(MoveScope {
                                values: vec![
                                    Value::number(0.0),
                                    Value::scope(ScopeProperty::Size, Axis::Y),
                                    Value::number(0.0),
                                ],
                            }),
                            RuleFunction::Roof(Roof {
                                kind: RoofType::Hipped,
                                angle: Value::random(25.0, 40.0),
                                output: "Roof".into(),
                            }),
                        ],
                        None,
                    ),
                ],
            ),
            street_facade(3.0, 3.0, "Entrance"),
            Rule::always("Entrance", vec![item(vec![bay(1.2, "Door")], None)]),
            Rule::always("Storey", vec![item(vec![repeat(Axis::X, 2.5, "Window")], None)]),
        ])
        .with_priority(vec![
            Rule::always("Facade", vec![item(vec![repeat(Axis::Y, 3.0, "Storey")], None)]),
            model("Window", "window"),
            model("Wall", "wall"),
            model("Door", "door"),
            model("Roof", "hipped_roof"),
            model("Floor", "slab"),
        ])
}

pub fn apartment_block() -> RuleSet {
    let clear_bay = Condition::new(
        ShapeQuery::Occlusion {
            filter: OcclusionFilter::NoParent,
        },
        ConditionType::Equal,
        Some(Value::occlusion(OcclusionResult::None)),
    );

    RuleSet::new(APARTMENT_BLOCK, axiom())
        .with_priority(vec![
            extrude(Value::random(10.0, 18.0)),
            Rule::always("Mass", vec![item(vec![faces([4.0, 1.0, 1.0], ["Facade", "Floor", "Roof"])], None)]),
            street_facade(4.0, 3.0, "Shopfront"),
            Rule::always("Storey", vec![item(vec![repeat(Axis::X, 3.0, "Bay")], None)]),
            Rule::always("Bay", vec![item(vec![bay(1.4, "Window")], None)]).with_condition(clear_bay),
        ])
        .with_priority(vec![
            Rule::always("Facade", vec![item(vec![repeat(Axis::Y, 3.0, "Storey")], None)]),
            model("Bay", "wall"),
            model("Shopfront", "shopfront"),
            model("Window", "window"),
            model("Wall", "wall"),
            model("Roof", "flat_roof"),
            model("Floor", "slab"),
        ])
}

pub fn office_tower() -> RuleSet {
    let inset = |axis| {
        Value::operation(
            Operator::Multiply,
            Value::scope(ScopeProperty::Size, axis),
            Value::number(0.15),
        )
    };
    let setback = RuleAction::new(
        0.6,
        vec![item(
            vec![RuleFunction::Subdivide(Subdivide {
                axis: Axis::Y,
                values: vec![Value::fraction(0.75), Value::fraction(0.25)],
                items: vec![
                    Some(RuleActionItem::output("Shaft")),
                    Some(item(
                        vec![
                            RuleFunction::MoveScope(MoveScope {
                                values: vec![inset(Axis::X), Value::number(0.0), inset(Axis::Z)],
                            }),
                            RuleFunction::ScaleScope(ScaleScope {
                                values: vec![Value::fraction(0.7), Value::fraction(1.0), Value::fraction(0.7)],
                            }),
                        ],
                        Some("Shaft"),
                    )),
                ],
            })],
            None,
        )],
    );
    let plain = RuleAction::new(0.4, vec![RuleActionItem::output("Shaft")]);

    RuleSet::new(OFFICE_TOWER, axiom()).with_priority(vec![
        extrude(Value::random(30.0, 60.0)),
        Rule::new("Mass", Vec::new(), vec![setback, plain]),
        Rule::always("Shaft", vec![item(vec![faces([4.0, 1.0, 1.0], ["Curtain", "Floor", "Roof"])], None)]),
        Rule::always("Curtain", vec![item(vec![repeat(Axis::Y, 4.0, "Level")], None)]),
        Rule::always("Level", vec![item(vec![repeat(Axis::X, 2.0, "Panel")], None)]),
        model("Panel", "glass"),
        model("Roof", "flat_roof"),
        model("Floor", "slab"),
    ])
}
