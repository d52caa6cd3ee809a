use crate::replicated_component;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

replicated_component!(Position { x: f32, y: f32, z: f32 });

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Score {
    pub points: u32,
}

replicated_component!(Score { points: u32 });

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Input {
    pub dx: f32,
    pub jump: bool,
}

replicated_component!(client_authoritative Input { dx: f32, jump: bool });
