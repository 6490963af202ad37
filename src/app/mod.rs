// Application boundary: the ports the pipeline depends on

pub mod ports;
