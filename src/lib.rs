#[allow(non_snake_case)]
pub mod Components;
#[allow(non_snake_case)]
pub mod Kinetics;
#[allow(non_snake_case)]
pub mod Phases;
#[allow(non_snake_case)]
pub mod Reactors;
#[allow(non_snake_case)]
pub mod Utils;
