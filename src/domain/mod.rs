// Domain layer: emitter state, records and the ports the core talks through.

pub mod model;
pub mod ports;
