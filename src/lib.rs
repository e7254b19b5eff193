//! Procedural city generation.
//!
//! A road network is grown from a city centre over a height map and a
//! population density map, then lots along the roads are filled with
//! buildings derived from shape grammars.

pub mod config;
pub mod procgen;
pub mod world;
